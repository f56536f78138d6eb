//! Integration tests for the PocketPet host
//!
//! End-to-end scenarios: a full session lifecycle, autosave behavior across
//! passes and sessions, and input levels observed by the engine.


#[cfg(test)]
pub(crate) mod test_utils {
    use std::path::Path;

    use crate::{
        runtime::{HostLoop, RuntimeConfig},
        test_utils::{ManualTimeSource, RecordingEngine, RecordingSink, calendar},
    };

    pub type TestLoop = HostLoop<RecordingEngine, ManualTimeSource, RecordingSink>;

    /// Unpaced host loop saving to `save_path`, clock at calendar(0).
    pub fn new_test_loop(save_path: &Path) -> (TestLoop, ManualTimeSource) {
        let mut config = RuntimeConfig::new(save_path);
        config.target_fps = 0;
        let time = ManualTimeSource::new(calendar(0));
        let host = HostLoop::new(config, time.clone(), RecordingSink::default());
        (host, time)
    }
}
