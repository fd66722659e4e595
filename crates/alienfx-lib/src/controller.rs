//! Attach/detach lifecycle: wires a model's zone table, a session and the
//! LED registry together for one device instance.

use std::fmt;

use crate::device::Transport;
use crate::led::{LedHandle, LedRegistry, RegistryError};
use crate::models::ModelProfile;
use crate::session::{Session, SessionConfig, SessionStats};
use crate::zones::{ZoneId, ZoneTable};

/// Attach failures. Any of these leaves nothing registered.
#[derive(Debug)]
pub enum AttachError {
    /// Could not allocate the zone table or name buffers.
    AllocationFailure,
    /// The session worker thread could not be spawned.
    Spawn(std::io::Error),
    Registry(RegistryError),
}

impl fmt::Display for AttachError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachError::AllocationFailure => write!(f, "Attach failed: out of memory"),
            AttachError::Spawn(e) => write!(f, "Attach failed: session worker: {e}"),
            AttachError::Registry(e) => write!(f, "Attach failed: {e}"),
        }
    }
}

impl std::error::Error for AttachError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AttachError::Spawn(e) => Some(e),
            AttachError::Registry(e) => Some(e),
            AttachError::AllocationFailure => None,
        }
    }
}

/// An attached device: its running session and registered control points.
pub struct Controller {
    instance: String,
    session: Session,
    control_points: Vec<String>,
}

impl Controller {
    /// Build the zone table, start the session and register one control
    /// point per zone. On any failure everything already registered is
    /// unregistered again and the session is stopped.
    pub fn attach(
        profile: &ModelProfile,
        instance: &str,
        transport: impl Transport + 'static,
        registry: &mut dyn LedRegistry,
        config: SessionConfig,
    ) -> Result<Self, AttachError> {
        let zones =
            ZoneTable::from_descriptors(profile.zones).map_err(|_| AttachError::AllocationFailure)?;

        let mut names: Vec<(ZoneId, String)> = Vec::new();
        names
            .try_reserve_exact(zones.len())
            .map_err(|_| AttachError::AllocationFailure)?;
        names.extend(
            zones
                .iter()
                .map(|(id, zone)| (id, format!("{instance}::{}", zone.name()))),
        );

        let session = Session::start(zones, transport, config).map_err(AttachError::Spawn)?;

        let mut control_points: Vec<String> = Vec::with_capacity(names.len());
        for (id, name) in names {
            let handle = LedHandle::new(name.clone(), id, session.handle());
            if let Err(e) = registry.register(handle) {
                log::warn!("could not register {name}: {e}");
                for registered in control_points.iter().rev() {
                    registry.unregister(registered);
                }
                session.shutdown();
                return Err(AttachError::Registry(e));
            }
            control_points.push(name);
        }

        log::info!(
            "attached {instance} ({}): {} zone(s)",
            profile.name,
            control_points.len()
        );
        Ok(Controller {
            instance: instance.to_string(),
            session,
            control_points,
        })
    }

    /// Unregister every control point, then stop the session once any
    /// in-flight run has finished. Returns the session's final counters.
    pub fn detach(self, registry: &mut dyn LedRegistry) -> SessionStats {
        for name in &self.control_points {
            registry.unregister(name);
        }
        let stats = {
            self.session.wait_idle();
            self.session.stats()
        };
        self.session.shutdown();
        log::info!("detached {}", self.instance);
        stats
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Registered names, in zone declaration order.
    pub fn control_points(&self) -> &[String] {
        &self.control_points
    }
}
