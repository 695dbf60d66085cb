//! Session scripts
//!
//! A script is a YAML document describing one run: the masking scene, the four
//! maskers, the three screens and the ordered list of challenges. Loading a
//! script validates it completely against the video catalogue.

mod description;

pub use description::{
    BrightnessCalibration, Masker, ScreenTransform, SessionDescription, VideoScreen,
    MASKER_COUNT, SCREEN_COUNT, VIDEOS_PER_CHALLENGE,
};
