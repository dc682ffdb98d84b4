use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Hands the coordinator the tracks to attach to each new peer connection.
pub trait LocalMediaSource<T>: Send + Sync {
    fn tracks(&self) -> Vec<T>;
}

impl<T: Clone + Send + Sync> LocalMediaSource<T> for Vec<T> {
    fn tracks(&self) -> Vec<T> {
        self.clone()
    }
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Media permission denied")]
    PermissionDenied,
    #[error("Media unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
}

impl MediaConstraints {
    pub fn audio_video() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}

/// The user's answer to the capture-device prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaPermission {
    Granted,
    Denied,
}

/// Static-sample audio/video tracks standing in for capture devices.
#[derive(Clone, Default)]
pub struct SyntheticMedia {
    tracks: Vec<Arc<TrackLocalStaticSample>>,
}

impl SyntheticMedia {
    pub fn acquire(
        constraints: MediaConstraints,
        permission: MediaPermission,
    ) -> Result<Self, MediaError> {
        if permission == MediaPermission::Denied {
            return Err(MediaError::PermissionDenied);
        }
        if !constraints.audio && !constraints.video {
            return Err(MediaError::Unavailable(
                "neither audio nor video requested".to_owned(),
            ));
        }

        let mut tracks = Vec::new();
        if constraints.audio {
            tracks.push(Arc::new(TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_OPUS.to_owned(),
                    clock_rate: 48000,
                    channels: 2,
                    ..Default::default()
                },
                "audio".to_owned(),
                "tandem".to_owned(),
            )));
        }
        if constraints.video {
            tracks.push(Arc::new(TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_VP8.to_owned(),
                    clock_rate: 90000,
                    ..Default::default()
                },
                "video".to_owned(),
                "tandem".to_owned(),
            )));
        }

        info!("Acquired {} synthetic track(s)", tracks.len());
        Ok(Self { tracks })
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

impl LocalMediaSource<Arc<TrackLocalStaticSample>> for SyntheticMedia {
    fn tracks(&self) -> Vec<Arc<TrackLocalStaticSample>> {
        self.tracks.clone()
    }
}
