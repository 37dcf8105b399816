use crate::device::service::DeviceService;
use crate::device::signature::DeviceAuth;
use crate::documents::DocumentService;
use crate::heartbeat::service::HeartbeatService;
use crate::interview::reply::ReplyService;
use crate::interview::session::SessionService;
use crate::report::service::ReportService;
use crate::resume::service::ResumeService;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub resumes: ResumeService,
    pub sessions: SessionService,
    pub replies: ReplyService,
    pub reports: ReportService,
    pub heartbeats: HeartbeatService,
    pub devices: DeviceService,
    pub documents: DocumentService,
    /// Secret lookup and nonce registry for the device-signed routes.
    pub device_auth: DeviceAuth,
}
