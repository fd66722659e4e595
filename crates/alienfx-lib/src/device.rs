//! Device communication: transport trait + USB HID backend.

use std::fmt;

use serde::Serialize;

use crate::command::Packet;
use crate::models::ModelProfile;

// ── Error types ──

/// Per-packet send failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The device accepted fewer bytes than the packet holds.
    ShortWrite { written: usize, expected: usize },
    /// Link-level failure ("context: details").
    Io(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::ShortWrite { written, expected } => {
                write!(f, "Short write: {written} of {expected} bytes")
            }
            TransportError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Device discovery and open errors.
///
/// String payloads follow the convention **"context: details"**.
#[derive(Debug)]
pub enum DeviceError {
    NotFound,
    OpenFailed(String),
    UnsupportedDevice(String),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::NotFound => write!(f, "AlienFX controller not found"),
            DeviceError::OpenFailed(e) => write!(f, "Failed to open device: {e}"),
            DeviceError::UnsupportedDevice(name) => {
                write!(f, "Unsupported device: {name} (no zone table available)")
            }
        }
    }
}

impl std::error::Error for DeviceError {}

pub type Result<T> = std::result::Result<T, DeviceError>;

// ── Trait ──

/// Sink for command packets.
///
/// `send` is synchronous, best-effort, one packet per call, and must
/// complete or fail within a bounded time.
pub trait Transport: Send {
    fn send(&mut self, packet: &Packet) -> std::result::Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, packet: &Packet) -> std::result::Result<(), TransportError> {
        (**self).send(packet)
    }
}

// ── Device info ──

#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    /// Instance name, `BBBB:VVVV:PPPP.AAAA` (bus, vendor, product, address).
    /// Prefixes every registered control point name.
    pub instance: String,
    pub vendor_id: u16,
    pub product_id: u16,
    /// Model name from the matching profile.
    pub model: String,
    pub serial: Option<String>,
}

/// Format an instance name the way HID devices are named.
pub fn instance_name(bus: u8, vendor_id: u16, product_id: u16, address: u8) -> String {
    format!("{bus:04X}:{vendor_id:04X}:{product_id:04X}.{address:04X}")
}

/// A discovered controller (not yet opened).
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredDevice {
    pub instance: String,
    pub vendor_id: u16,
    pub product_id: u16,
    /// `None` when the product id has no profile.
    pub model: Option<String>,
    pub serial: Option<String>,
}

/// An opened controller: transport, profile and identity.
pub struct OpenedDevice<T> {
    pub transport: T,
    pub profile: &'static ModelProfile,
    pub info: DeviceInfo,
}

// ── Linux implementation ──

#[cfg(target_os = "linux")]
mod linux_impl {
    use super::*;
    use std::time::Duration;

    use nusb::transfer::{Control, ControlType, Recipient};

    use crate::models;

    use crate::protocol::{
        ALIENFX_VID, HID_REPORT_TYPE_OUTPUT, HID_REQ_SET_REPORT, PACKET_SIZE, USB_CLASS_HID,
        USB_TIMEOUT_MS,
    };

    /// HID output-report transport over a claimed USB interface.
    pub struct HidTransport {
        interface: nusb::Interface,
        interface_number: u16,
    }

    impl HidTransport {
        fn set_report(&self, data: &[u8]) -> std::result::Result<usize, String> {
            let report_id = data.first().copied().unwrap_or(0);
            let control = Control {
                control_type: ControlType::Class,
                recipient: Recipient::Interface,
                request: HID_REQ_SET_REPORT,
                value: (u16::from(HID_REPORT_TYPE_OUTPUT) << 8) | u16::from(report_id),
                index: self.interface_number,
            };
            self.interface
                .control_out_blocking(control, data, Duration::from_millis(USB_TIMEOUT_MS))
                .map_err(|e| format!("SET_REPORT(id={report_id}): {e}"))
        }

        /// Open the first supported controller, or the one with `serial`.
        pub fn open(serial: &str) -> Result<OpenedDevice<Self>> {
            let serial = serial.trim();
            let device_info = nusb::list_devices()
                .map_err(|e| DeviceError::OpenFailed(format!("USB enumeration: {e}")))?
                .filter(|dev| dev.vendor_id() == ALIENFX_VID)
                .find(|dev| {
                    serial.is_empty()
                        || dev
                            .serial_number()
                            .is_some_and(|s| s.eq_ignore_ascii_case(serial))
                })
                .ok_or(DeviceError::NotFound)?;

            let profile = models::detect_model(device_info.vendor_id(), device_info.product_id())
                .ok_or_else(|| {
                    DeviceError::UnsupportedDevice(format!(
                        "{:04x}:{:04x}",
                        device_info.vendor_id(),
                        device_info.product_id()
                    ))
                })?;

            let iface_num = device_info
                .interfaces()
                .find(|iface| iface.class() == USB_CLASS_HID)
                .map(|iface| iface.interface_number())
                .ok_or_else(|| DeviceError::OpenFailed("no HID interface".into()))?;

            let usb_device = device_info
                .open()
                .map_err(|e| DeviceError::OpenFailed(format!("USB open: {e}")))?;

            // The kernel's usbhid owns the interface until we detach it.
            let interface = usb_device
                .detach_and_claim_interface(iface_num)
                .map_err(|e| {
                    DeviceError::OpenFailed(format!("claim interface {iface_num}: {e}"))
                })?;

            let info = DeviceInfo {
                instance: instance_name(
                    device_info.bus_number(),
                    device_info.vendor_id(),
                    device_info.product_id(),
                    device_info.device_address(),
                ),
                vendor_id: device_info.vendor_id(),
                product_id: device_info.product_id(),
                model: profile.name.to_string(),
                serial: device_info.serial_number().map(|s| s.to_string()),
            };
            log::info!("opened {} ({}) on interface {iface_num}", info.model, info.instance);

            Ok(OpenedDevice {
                transport: HidTransport {
                    interface,
                    interface_number: u16::from(iface_num),
                },
                profile,
                info,
            })
        }
    }

    impl Transport for HidTransport {
        fn send(&mut self, packet: &Packet) -> std::result::Result<(), TransportError> {
            let written = self.set_report(packet.as_ref()).map_err(TransportError::Io)?;
            if written != PACKET_SIZE {
                return Err(TransportError::ShortWrite {
                    written,
                    expected: PACKET_SIZE,
                });
            }
            Ok(())
        }
    }

    pub fn enumerate() -> Vec<DiscoveredDevice> {
        let Ok(devices) = nusb::list_devices() else {
            return Vec::new();
        };
        devices
            .filter(|dev| dev.vendor_id() == ALIENFX_VID)
            .filter(|dev| dev.interfaces().any(|iface| iface.class() == USB_CLASS_HID))
            .map(|dev| DiscoveredDevice {
                instance: instance_name(
                    dev.bus_number(),
                    dev.vendor_id(),
                    dev.product_id(),
                    dev.device_address(),
                ),
                vendor_id: dev.vendor_id(),
                product_id: dev.product_id(),
                model: models::detect_model(dev.vendor_id(), dev.product_id())
                    .map(|m| m.name.to_string()),
                serial: dev.serial_number().map(|s| s.to_string()),
            })
            .collect()
    }
}

#[cfg(target_os = "linux")]
pub use linux_impl::HidTransport;

// ── Stub transport for unsupported platforms ──

/// Placeholder transport that is never found.
/// Enables compilation and `cargo test` on unsupported hosts.
#[cfg(not(target_os = "linux"))]
pub struct StubTransport;

#[cfg(not(target_os = "linux"))]
impl StubTransport {
    pub fn open(_serial: &str) -> Result<OpenedDevice<Self>> {
        Err(DeviceError::NotFound)
    }
}

#[cfg(not(target_os = "linux"))]
impl Transport for StubTransport {
    fn send(&mut self, _packet: &Packet) -> std::result::Result<(), TransportError> {
        Err(TransportError::Io("no USB backend on this platform".into()))
    }
}

/// Concrete transport type for the current platform.
#[cfg(target_os = "linux")]
pub type PlatformTransport = HidTransport;
#[cfg(not(target_os = "linux"))]
pub type PlatformTransport = StubTransport;

/// Open the platform transport. An empty `serial` selects the first controller.
pub fn open_device(serial: &str) -> Result<OpenedDevice<PlatformTransport>> {
    PlatformTransport::open(serial)
}

/// Enumerate connected AlienFX controllers without opening them.
/// On unsupported platforms, always returns an empty list.
pub fn enumerate_devices() -> Vec<DiscoveredDevice> {
    #[cfg(target_os = "linux")]
    {
        linux_impl::enumerate()
    }
    #[cfg(not(target_os = "linux"))]
    {
        Vec::new()
    }
}

// ── Mock transport for testing ──

/// In-memory transport for unit and integration tests.
///
/// Always compiled, hidden from public docs.
#[doc(hidden)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex, MutexGuard};
    use std::time::Duration;

    #[derive(Default)]
    struct Shared {
        /// Packets that were delivered, in order.
        sent: Mutex<Vec<Packet>>,
        /// Injected failures keyed by 0-based send attempt.
        failures: Mutex<HashMap<usize, TransportError>>,
        attempts: AtomicUsize,
        in_flight: AtomicBool,
        /// Times a `send` started while another was still running.
        overlaps: AtomicUsize,
        delay: Mutex<Duration>,
    }

    /// Recording transport. Clones share state, so a test can keep one
    /// clone for inspection after handing another to a session.
    #[derive(Clone, Default)]
    pub struct MockTransport {
        shared: Arc<Shared>,
    }

    fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
        m.lock().unwrap_or_else(|e| e.into_inner())
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Packets delivered so far.
        pub fn sent(&self) -> Vec<Packet> {
            lock(&self.shared.sent).clone()
        }

        /// Delivered packets as hex strings.
        pub fn sent_hex(&self) -> Vec<String> {
            self.sent().iter().map(Packet::to_hex).collect()
        }

        pub fn clear(&self) {
            lock(&self.shared.sent).clear();
        }

        /// Total `send` calls, failed ones included.
        pub fn attempts(&self) -> usize {
            self.shared.attempts.load(Ordering::SeqCst)
        }

        pub fn overlaps(&self) -> usize {
            self.shared.overlaps.load(Ordering::SeqCst)
        }

        /// Make the `n`-th send attempt (0-based, counted over the mock's
        /// lifetime) fail with `err`.
        pub fn fail_attempt(&self, n: usize, err: TransportError) {
            lock(&self.shared.failures).insert(n, err);
        }

        /// Sleep inside every `send`, widening race windows.
        pub fn set_delay(&self, delay: Duration) {
            *lock(&self.shared.delay) = delay;
        }
    }

    impl Transport for MockTransport {
        fn send(&mut self, packet: &Packet) -> std::result::Result<(), TransportError> {
            if self.shared.in_flight.swap(true, Ordering::SeqCst) {
                self.shared.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            let delay = *lock(&self.shared.delay);
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            let n = self.shared.attempts.fetch_add(1, Ordering::SeqCst);
            let result = match lock(&self.shared.failures).remove(&n) {
                Some(err) => Err(err),
                None => {
                    lock(&self.shared.sent).push(*packet);
                    Ok(())
                }
            };
            self.shared.in_flight.store(false, Ordering::SeqCst);
            result
        }
    }
}
