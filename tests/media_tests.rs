use std::sync::Arc;
use std::time::Duration;

use image::{DynamicImage, Rgb, RgbImage};
use video_vault::access::AccessHandles;
use video_vault::codec::Payload;
use video_vault::media::{
    encode_thumbnail, fit_within, seek_target, FfmpegFrameSource, MediaError, ThumbnailGenerator,
    ThumbnailOptions,
};

fn missing_ffmpeg(dir: &tempfile::TempDir) -> (ThumbnailGenerator, Arc<AccessHandles>) {
    let missing = dir.path().join("ffmpeg-not-installed");
    let handles = Arc::new(AccessHandles::new());
    let generator = ThumbnailGenerator::new(
        Arc::new(FfmpegFrameSource::new(&missing, &missing)),
        Arc::clone(&handles),
        ThumbnailOptions::default(),
    );
    (generator, handles)
}

#[test]
fn test_portrait_frame_is_capped_by_height() {
    assert_eq!(fit_within(1080, 1920, 320, 240), (135, 240));
}

#[test]
fn test_short_clip_seeks_a_tenth_in() {
    assert_eq!(seek_target(2.0), Duration::from_millis(200));
    assert_eq!(seek_target(600.0), Duration::from_secs(1));
}

#[test]
fn test_encode_thumbnail_produces_jpeg_data_uri() {
    let frame = DynamicImage::ImageRgb8(RgbImage::from_pixel(1920, 1080, Rgb([10, 120, 200])));
    let uri = encode_thumbnail(&frame, 320, 240, 80).unwrap();
    assert!(uri.starts_with("data:image/jpeg;base64,"));
}

#[tokio::test]
async fn test_empty_payload_rejected_before_spawning_decoder() {
    let dir = tempfile::tempdir().unwrap();
    let (generator, handles) = missing_ffmpeg(&dir);

    let result = generator
        .generate_thumbnail(&Payload::new(Vec::new(), "video/webm"))
        .await;
    assert!(matches!(result, Err(MediaError::EmptyPayload)));
    assert_eq!(handles.outstanding(), 0);
}

#[tokio::test]
async fn test_missing_decoder_fails_and_releases_handle() {
    let dir = tempfile::tempdir().unwrap();
    let (generator, handles) = missing_ffmpeg(&dir);
    let payload = Payload::new(vec![0x1a, 0x45, 0xdf, 0xa3], "video/webm");

    assert!(generator.generate_thumbnail(&payload).await.is_err());
    assert!(!generator.probe_playback(&payload).await);
    assert_eq!(handles.outstanding(), 0);
}
