use crate::camera::Camera;
use crate::risk::IncidentType;
use crate::smoothing::SmoothedMetrics;
use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;

/// Everything a notifier needs to describe one alert.
#[derive(Debug, Clone)]
pub struct AlertMessage<'a> {
    pub camera: &'a Camera,
    pub incident: IncidentType,
    pub risk: f64,
    /// Encoded bytes of the newer frame, attached as-is
    pub image: &'a [u8],
    pub smoothed: SmoothedMetrics,
    /// Local time of the run
    pub timestamp: DateTime<Tz>,
}

/// JSON view of an alert, without the image.
#[derive(Debug, Serialize)]
pub struct AlertSummary<'a> {
    pub camera_id: &'a str,
    pub camera: &'a str,
    pub highway: Option<&'a str>,
    pub incident_type: IncidentType,
    pub risk: f64,
    pub timestamp: String,
    pub subject: String,
    pub body: String,
    pub metrics_smoothed: SmoothedMetrics,
}

impl<'a> AlertMessage<'a> {
    pub fn subject(&self) -> String {
        format!(
            "DriveBC ALERT | {} | {} | {:.1}",
            self.camera.name,
            self.incident.title(),
            self.risk
        )
    }

    pub fn body(&self) -> String {
        let m = &self.smoothed;
        format!(
            "DRIVEBC TRAFFIC ALERT\n\n\
             Location: {name} (Highway {highway})\n\
             Detected: {title}\n\
             Risk Score: {risk:.1}/100\n\
             Time: {time}\n\n\
             Smoothed Metrics:\n\
             • Motion Score: {motion:.2}\n\
             • Brightness: {brightness:.1}\n\
             • Edge Density: {edges:.4}\n\
             • Occupancy Score: {occupancy:.3}\n\n\
             Image attached.\n\n\
             ---\n\
             Automated DriveBC Monitor\n",
            name = self.camera.name,
            highway = self.camera.highway.as_deref().unwrap_or("N/A"),
            title = self.incident.title(),
            risk = self.risk,
            time = self.timestamp.format("%Y-%m-%d %H:%M:%S %Z"),
            motion = m.motion_score,
            brightness = m.brightness,
            edges = m.edge_density,
            occupancy = m.occupancy_score,
        )
    }

    pub fn attachment_name(&self) -> String {
        format!(
            "DriveBC_{}_{}.jpg",
            self.camera.id,
            self.timestamp.format("%Y%m%d_%H%M%S")
        )
    }

    pub fn summary(&self) -> AlertSummary<'a> {
        let camera = self.camera;
        AlertSummary {
            camera_id: &camera.id,
            camera: &camera.name,
            highway: camera.highway.as_deref(),
            incident_type: self.incident,
            risk: self.risk,
            timestamp: self.timestamp.to_rfc3339(),
            subject: self.subject(),
            body: self.body(),
            metrics_smoothed: self.smoothed,
        }
    }
}
