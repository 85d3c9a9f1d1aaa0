// Application state for HTTP handlers
use crate::application::device_service::DeviceService;
use crate::application::multidevice_service::MultideviceService;

#[derive(Clone)]
pub struct AppState {
    pub multidevice_service: MultideviceService,
    pub device_service: DeviceService,
    pub default_window_hours: u32,
}
