// Camera module: frame sources, permission gating and the capture loop

use crate::decoder::rgb_to_yuv420;
use crate::error::{MoodLensError, Result};
use crate::models::CameraFrame;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Which way a camera faces
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LensFacing {
    Front,
    Back,
}

impl LensFacing {
    pub fn opposite(self) -> Self {
        match self {
            LensFacing::Front => LensFacing::Back,
            LensFacing::Back => LensFacing::Front,
        }
    }

    /// Sensor mounting angle typical for phones
    fn default_orientation(self) -> i32 {
        match self {
            LensFacing::Front => 270,
            LensFacing::Back => 90,
        }
    }
}

/// A camera the source can open
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraDevice {
    pub index: usize,
    pub name: String,
    pub lens: LensFacing,
}

/// Anything that can enumerate cameras and deliver planar frames
pub trait CameraSource: Send {
    fn devices(&self) -> Vec<CameraDevice>;
    fn open(&mut self, device: &CameraDevice) -> Result<()>;
    fn close(&mut self);
    /// Next frame of the open stream, `None` once the stream has ended
    fn next_frame(&mut self) -> Result<Option<CameraFrame>>;
}

/// Outcome of a camera permission request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

/// Platform permission prompt
pub trait PermissionGate: Send {
    fn request(&mut self) -> Permission;
}

/// Permission gate with a fixed answer
#[derive(Clone, Copy, Debug)]
pub struct StaticPermission(pub Permission);

impl PermissionGate for StaticPermission {
    fn request(&mut self) -> Permission {
        self.0
    }
}

/// Lifecycle state of the camera as shown to the user
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraStatus {
    NotInitialized,
    Ready,
    Streaming,
    PermissionDenied,
}

/// Still images replayed as camera frames.
///
/// A directory with `front/` and/or `back/` subdirectories exposes one device
/// per subdirectory; otherwise the directory itself is a single front camera.
pub struct ImageSequenceSource {
    devices: Vec<(CameraDevice, Vec<PathBuf>)>,
    open: Option<(CameraDevice, std::vec::IntoIter<PathBuf>)>,
}

impl ImageSequenceSource {
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(MoodLensError::CameraInit(format!(
                "Frame directory {dir:?} does not exist"
            )));
        }

        let mut devices = Vec::new();
        for (lens, sub) in [(LensFacing::Front, "front"), (LensFacing::Back, "back")] {
            let path = dir.join(sub);
            if path.is_dir() {
                let device = CameraDevice {
                    index: devices.len(),
                    name: format!("{sub} ({})", path.display()),
                    lens,
                };
                devices.push((device, list_images(&path)?));
            }
        }
        if devices.is_empty() {
            let device = CameraDevice {
                index: 0,
                name: dir.display().to_string(),
                lens: LensFacing::Front,
            };
            devices.push((device, list_images(dir)?));
        }

        Ok(Self {
            devices,
            open: None,
        })
    }
}

/// Image files in `dir`, sorted by name
fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        MoodLensError::ImageLoad(format!("Failed to read directory {dir:?}: {e}"))
    })?;

    let mut images: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
                .unwrap_or(false)
        })
        .collect();
    images.sort();
    Ok(images)
}

impl CameraSource for ImageSequenceSource {
    fn devices(&self) -> Vec<CameraDevice> {
        self.devices.iter().map(|(device, _)| device.clone()).collect()
    }

    fn open(&mut self, device: &CameraDevice) -> Result<()> {
        let (device, images) = self
            .devices
            .iter()
            .find(|(candidate, _)| candidate == device)
            .ok_or_else(|| MoodLensError::CameraInit(format!("Unknown device {}", device.name)))?;
        if images.is_empty() {
            return Err(MoodLensError::CameraInit(format!(
                "Device {} has no frames",
                device.name
            )));
        }
        self.open = Some((device.clone(), images.clone().into_iter()));
        Ok(())
    }

    fn close(&mut self) {
        self.open = None;
    }

    fn next_frame(&mut self) -> Result<Option<CameraFrame>> {
        let Some((device, images)) = self.open.as_mut() else {
            return Err(MoodLensError::CameraInit("Stream is not open".to_string()));
        };
        let Some(path) = images.next() else {
            return Ok(None);
        };

        let image = image::open(&path).map_err(|e| {
            MoodLensError::ImageLoad(format!("Failed to load frame from {path:?}: {e}"))
        })?;
        let frame = rgb_to_yuv420(&image.to_rgb8())?;
        Ok(Some(CameraFrame {
            frame,
            sensor_orientation: device.lens.default_orientation(),
        }))
    }
}

/// Manages camera permission, device selection and frame capture
pub struct CameraManager<S: CameraSource> {
    source: S,
    permission: Box<dyn PermissionGate>,
    lens: LensFacing,
    device: Option<CameraDevice>,
    status: CameraStatus,
}

impl<S: CameraSource> CameraManager<S> {
    /// Creates a manager; nothing is opened until [`Self::ensure_stream_open`]
    pub fn new(source: S, permission: Box<dyn PermissionGate>, lens: LensFacing) -> Self {
        Self {
            source,
            permission,
            lens,
            device: None,
            status: CameraStatus::NotInitialized,
        }
    }

    pub fn status(&self) -> CameraStatus {
        self.status
    }

    /// Lists available camera devices
    pub fn list_devices(&self) -> Vec<CameraDevice> {
        self.source.devices()
    }

    pub fn current_device(&self) -> Option<&CameraDevice> {
        self.device.as_ref()
    }

    /// Requests permission (once) and opens the camera facing the preferred
    /// lens, falling back to any available device.
    ///
    /// A denied permission is final: later calls fail without prompting again.
    /// An open failure leaves the camera `NotInitialized`; calling this again
    /// is the manual retry.
    pub fn ensure_stream_open(&mut self) -> Result<()> {
        match self.status {
            CameraStatus::PermissionDenied => return Err(MoodLensError::CameraAccessDenied),
            CameraStatus::Ready | CameraStatus::Streaming => return Ok(()),
            CameraStatus::NotInitialized => {}
        }

        if self.permission.request() == Permission::Denied {
            warn!("Camera permission denied");
            self.status = CameraStatus::PermissionDenied;
            return Err(MoodLensError::CameraAccessDenied);
        }

        let devices = self.source.devices();
        let device = devices
            .iter()
            .find(|d| d.lens == self.lens)
            .or_else(|| devices.first())
            .cloned()
            .ok_or_else(|| MoodLensError::CameraInit("No camera devices available".to_string()))
            .inspect_err(|e| error!("Camera initialization failed: {}", e))?;

        if let Err(e) = self.source.open(&device) {
            error!("Failed to open camera {}: {}", device.name, e);
            self.status = CameraStatus::NotInitialized;
            return Err(e);
        }

        info!("Opened camera {} ({:?})", device.name, device.lens);
        self.lens = device.lens;
        self.device = Some(device);
        self.status = CameraStatus::Ready;
        Ok(())
    }

    /// Switches between front and back cameras and reopens the stream
    pub fn switch_camera(&mut self) -> Result<()> {
        if self.status == CameraStatus::PermissionDenied {
            return Err(MoodLensError::CameraAccessDenied);
        }
        self.stop_capture();
        self.source.close();
        self.device = None;
        self.status = CameraStatus::NotInitialized;
        self.lens = self.lens.opposite();
        self.ensure_stream_open()
    }

    /// Captures frames at the given pace and pushes them to `frame_sender`.
    ///
    /// Frames are dropped when the channel is full. Returns when the source
    /// runs out of frames or the receiving side is gone.
    pub async fn start_capture(
        &mut self,
        frame_sender: mpsc::Sender<CameraFrame>,
        frame_duration: Duration,
    ) -> Result<()> {
        if self.status == CameraStatus::Streaming {
            warn!("Camera capture is already running");
            return Ok(());
        }
        self.ensure_stream_open()?;
        self.status = CameraStatus::Streaming;

        let mut last_frame_time = Instant::now();
        let mut sent = 0usize;
        let mut dropped = 0usize;

        while self.status == CameraStatus::Streaming && !frame_sender.is_closed() {
            let elapsed = last_frame_time.elapsed();
            if elapsed < frame_duration {
                tokio::time::sleep(frame_duration - elapsed).await;
            } else {
                // try_send never suspends; let the consumer on this task run
                tokio::task::yield_now().await;
            }
            last_frame_time = Instant::now();

            match self.source.next_frame() {
                Ok(Some(frame)) => match frame_sender.try_send(frame) {
                    Ok(()) => sent += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => dropped += 1,
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                },
                Ok(None) => {
                    debug!("Camera stream ended");
                    break;
                }
                Err(e) => {
                    error!("Failed to capture frame: {}", e);
                    continue;
                }
            }
        }

        info!("Capture finished: {} frames sent, {} dropped", sent, dropped);
        self.stop_capture();
        Ok(())
    }

    /// Stops the camera capture
    pub fn stop_capture(&mut self) {
        if self.status == CameraStatus::Streaming {
            self.status = CameraStatus::Ready;
        }
    }
}

impl<S: CameraSource> Drop for CameraManager<S> {
    fn drop(&mut self) {
        self.stop_capture();
        self.source.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawFrame;
    use image::{Rgb, RgbImage};

    /// Source producing `remaining` gray frames
    struct SyntheticSource {
        devices: Vec<CameraDevice>,
        opened: Option<CameraDevice>,
        remaining: usize,
        fail_open: bool,
    }

    impl SyntheticSource {
        fn new(lenses: &[LensFacing], frames: usize) -> Self {
            let devices = lenses
                .iter()
                .enumerate()
                .map(|(index, &lens)| CameraDevice {
                    index,
                    name: format!("cam{index}"),
                    lens,
                })
                .collect();
            Self {
                devices,
                opened: None,
                remaining: frames,
                fail_open: false,
            }
        }
    }

    impl CameraSource for SyntheticSource {
        fn devices(&self) -> Vec<CameraDevice> {
            self.devices.clone()
        }

        fn open(&mut self, device: &CameraDevice) -> Result<()> {
            if self.fail_open {
                return Err(MoodLensError::CameraInit("busy".to_string()));
            }
            self.opened = Some(device.clone());
            Ok(())
        }

        fn close(&mut self) {
            self.opened = None;
        }

        fn next_frame(&mut self) -> Result<Option<CameraFrame>> {
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;
            Ok(Some(CameraFrame {
                frame: RawFrame::from_packed(2, 2, vec![128; 4], vec![128], vec![128]),
                sensor_orientation: 90,
            }))
        }
    }

    fn granted() -> Box<dyn PermissionGate> {
        Box::new(StaticPermission(Permission::Granted))
    }

    #[test]
    fn opens_preferred_lens_and_switches() {
        let source = SyntheticSource::new(&[LensFacing::Back, LensFacing::Front], 0);
        let mut camera = CameraManager::new(source, granted(), LensFacing::Front);
        camera.ensure_stream_open().unwrap();
        assert_eq!(camera.status(), CameraStatus::Ready);
        assert_eq!(camera.current_device().unwrap().lens, LensFacing::Front);

        camera.switch_camera().unwrap();
        assert_eq!(camera.current_device().unwrap().lens, LensFacing::Back);
        assert_eq!(camera.list_devices().len(), 2);
    }

    #[test]
    fn falls_back_to_first_device() {
        let source = SyntheticSource::new(&[LensFacing::Back], 0);
        let mut camera = CameraManager::new(source, granted(), LensFacing::Front);
        camera.ensure_stream_open().unwrap();
        assert_eq!(camera.current_device().unwrap().lens, LensFacing::Back);
    }

    #[test]
    fn permission_denial_is_terminal() {
        let source = SyntheticSource::new(&[LensFacing::Front], 0);
        let mut camera = CameraManager::new(
            source,
            Box::new(StaticPermission(Permission::Denied)),
            LensFacing::Front,
        );
        assert!(matches!(
            camera.ensure_stream_open(),
            Err(MoodLensError::CameraAccessDenied)
        ));
        assert_eq!(camera.status(), CameraStatus::PermissionDenied);
        assert!(camera.switch_camera().is_err());
    }

    #[test]
    fn open_failure_leaves_camera_uninitialized() {
        let mut source = SyntheticSource::new(&[LensFacing::Front], 0);
        source.fail_open = true;
        let mut camera = CameraManager::new(source, granted(), LensFacing::Front);
        assert!(camera.ensure_stream_open().is_err());
        assert_eq!(camera.status(), CameraStatus::NotInitialized);

        camera.source.fail_open = false;
        camera.ensure_stream_open().unwrap();
        assert_eq!(camera.status(), CameraStatus::Ready);
    }

    #[tokio::test]
    async fn capture_drops_frames_when_channel_is_full() {
        let source = SyntheticSource::new(&[LensFacing::Front], 5);
        let mut camera = CameraManager::new(source, granted(), LensFacing::Front);
        let (tx, mut rx) = mpsc::channel(2);
        camera.start_capture(tx, Duration::ZERO).await.unwrap();
        assert_eq!(camera.status(), CameraStatus::Ready);

        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 2);
    }

    #[tokio::test]
    async fn unpaced_capture_still_lets_consumer_run() {
        let source = SyntheticSource::new(&[LensFacing::Front], 10);
        let mut camera = CameraManager::new(source, granted(), LensFacing::Front);
        let (tx, mut rx) = mpsc::channel(1);

        let consumer = async move {
            let mut received = 0;
            while rx.recv().await.is_some() {
                received += 1;
            }
            received
        };

        let (capture, received) = tokio::join!(camera.start_capture(tx, Duration::ZERO), consumer);
        capture.unwrap();
        // without a yield the loop runs to completion and only the single slot is read
        assert!(received > 1, "consumer only saw {received} frames");
    }

    #[test]
    fn image_directory_replays_as_frames() {
        let dir = tempfile::tempdir().unwrap();
        let back = dir.path().join("back");
        std::fs::create_dir(&back).unwrap();
        RgbImage::from_pixel(4, 4, Rgb([255, 255, 255]))
            .save(back.join("001.png"))
            .unwrap();
        RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]))
            .save(back.join("002.png"))
            .unwrap();
        std::fs::write(back.join("notes.txt"), "ignored").unwrap();

        let mut source = ImageSequenceSource::from_dir(dir.path()).unwrap();
        let devices = source.devices();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].lens, LensFacing::Back);

        source.open(&devices[0]).unwrap();
        let first = source.next_frame().unwrap().unwrap();
        assert_eq!(first.sensor_orientation, 90);
        assert_eq!(first.frame.y.bytes, vec![255; 16]);
        let second = source.next_frame().unwrap().unwrap();
        assert_eq!(second.frame.y.bytes, vec![0; 16]);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn missing_directory_is_camera_init_error() {
        assert!(matches!(
            ImageSequenceSource::from_dir("/no/such/frames"),
            Err(MoodLensError::CameraInit(_))
        ));
    }
}
