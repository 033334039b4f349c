//! Script playback, treated by the session core as a black-box media element.
//!
//! Audio objects are not `Send`, so the engine owns them on a dedicated
//! thread and the handle talks to it over a channel. Real output needs the
//! `audio` feature; without it the engine only tracks playback state.

#[cfg(feature = "audio")]
pub mod brown_noise;

use std::sync::{
    mpsc::{self, Sender},
    Arc, Mutex,
};
use std::thread;

use log::error;

/// Media element driven by the session controller.
pub trait Playback: Send + Sync {
    fn load(&self, audio_ref: &str) -> Result<(), String>;
    fn play(&self) -> Result<(), String>;
    fn pause(&self) -> Result<(), String>;
    fn stop(&self) -> Result<(), String>;
    /// Effective volume in `0..=1`; mute is expressed as `0.0`.
    fn set_volume(&self, volume: f32) -> Result<(), String>;
}

enum AudioCommand {
    Load(String),
    Play,
    Pause,
    Stop,
    SetVolume(f32),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackStatus {
    pub loaded: Option<String>,
    pub playing: bool,
    pub volume: f32,
}

pub struct AudioEngineHandle {
    tx: Mutex<Option<Sender<AudioCommand>>>,
    status: Arc<Mutex<PlaybackStatus>>,
}

impl Default for AudioEngineHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEngineHandle {
    pub fn new() -> Self {
        Self {
            tx: Mutex::new(None),
            status: Arc::new(Mutex::new(PlaybackStatus {
                volume: 1.0,
                ..PlaybackStatus::default()
            })),
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        match self.status.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<AudioCommand>, String> {
        let mut guard = self.tx.lock().map_err(|e| e.to_string())?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();
        let status = Arc::clone(&self.status);

        thread::Builder::new()
            .name("mindful-audio".to_string())
            .spawn(move || {
                let mut output = output::Output::new();

                while let Ok(cmd) = rx.recv() {
                    let result = match &cmd {
                        AudioCommand::Load(audio_ref) => output.load(audio_ref),
                        AudioCommand::Play => output.play(),
                        AudioCommand::Pause => output.pause(),
                        AudioCommand::Stop => output.stop(),
                        AudioCommand::SetVolume(v) => output.set_volume(*v),
                    };
                    if let Err(err) = result {
                        error!("Audio command failed: {err}");
                        continue;
                    }

                    let mut state = match status.lock() {
                        Ok(guard) => guard,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    match cmd {
                        AudioCommand::Load(audio_ref) => {
                            state.loaded = Some(audio_ref);
                            state.playing = false;
                        }
                        AudioCommand::Play => state.playing = state.loaded.is_some(),
                        AudioCommand::Pause => state.playing = false,
                        AudioCommand::Stop => {
                            state.loaded = None;
                            state.playing = false;
                        }
                        AudioCommand::SetVolume(v) => state.volume = v.clamp(0.0, 1.0),
                    }
                }
            })
            .map_err(|e| e.to_string())?;

        *guard = Some(tx.clone());
        Ok(tx)
    }

    fn send(&self, command: AudioCommand) -> Result<(), String> {
        let tx = self.ensure_thread()?;
        tx.send(command).map_err(|e| e.to_string())
    }
}

impl Playback for AudioEngineHandle {
    fn load(&self, audio_ref: &str) -> Result<(), String> {
        self.send(AudioCommand::Load(audio_ref.to_string()))
    }

    fn play(&self) -> Result<(), String> {
        self.send(AudioCommand::Play)
    }

    fn pause(&self) -> Result<(), String> {
        self.send(AudioCommand::Pause)
    }

    fn stop(&self) -> Result<(), String> {
        // Nothing to stop if the engine never started.
        if let Ok(Some(tx)) = self.tx.lock().map(|g| g.clone()) {
            let _ = tx.send(AudioCommand::Stop);
        }
        Ok(())
    }

    fn set_volume(&self, volume: f32) -> Result<(), String> {
        self.send(AudioCommand::SetVolume(volume))
    }
}

#[cfg(feature = "audio")]
mod output {
    use std::{fs::File, io::BufReader};

    use rodio::{Decoder, OutputStream, Sink, Source};

    use super::brown_noise::BrownNoise;
    use crate::catalog::AMBIENT_BROWN_NOISE;

    pub struct Output {
        _stream: Option<OutputStream>,
        sink: Option<Sink>,
        volume: f32,
    }

    impl Output {
        pub fn new() -> Self {
            Self {
                _stream: None,
                sink: None,
                volume: 1.0,
            }
        }

        pub fn load(&mut self, audio_ref: &str) -> Result<(), String> {
            self.stop()?;

            let (stream, handle) = OutputStream::try_default()
                .map_err(|e| format!("Failed to create audio output stream: {}", e))?;
            let sink = Sink::try_new(&handle)
                .map_err(|e| format!("Failed to create audio sink: {}", e))?;
            sink.pause();
            sink.set_volume(self.volume);

            if audio_ref == AMBIENT_BROWN_NOISE {
                sink.append(BrownNoise::new());
            } else {
                let file = File::open(audio_ref)
                    .map_err(|e| format!("Failed to open audio '{}': {}", audio_ref, e))?;
                let source = Decoder::new(BufReader::new(file))
                    .map_err(|e| format!("Failed to decode audio '{}': {}", audio_ref, e))?;
                sink.append(source.repeat_infinite());
            }

            self._stream = Some(stream);
            self.sink = Some(sink);
            Ok(())
        }

        pub fn play(&mut self) -> Result<(), String> {
            if let Some(ref s) = self.sink {
                s.play();
            }
            Ok(())
        }

        pub fn pause(&mut self) -> Result<(), String> {
            if let Some(ref s) = self.sink {
                s.pause();
            }
            Ok(())
        }

        pub fn stop(&mut self) -> Result<(), String> {
            if let Some(s) = self.sink.take() {
                s.stop();
            }
            self._stream = None;
            Ok(())
        }

        pub fn set_volume(&mut self, volume: f32) -> Result<(), String> {
            self.volume = volume.clamp(0.0, 1.0);
            if let Some(ref s) = self.sink {
                s.set_volume(self.volume);
            }
            Ok(())
        }
    }
}

#[cfg(not(feature = "audio"))]
mod output {
    /// Stand-in output used when the crate is built without a sound device.
    pub struct Output;

    impl Output {
        pub fn new() -> Self {
            Output
        }

        pub fn load(&mut self, _audio_ref: &str) -> Result<(), String> {
            Ok(())
        }

        pub fn play(&mut self) -> Result<(), String> {
            Ok(())
        }

        pub fn pause(&mut self) -> Result<(), String> {
            Ok(())
        }

        pub fn stop(&mut self) -> Result<(), String> {
            Ok(())
        }

        pub fn set_volume(&mut self, _volume: f32) -> Result<(), String> {
            Ok(())
        }
    }
}

#[cfg(all(test, not(feature = "audio")))]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn wait_for(handle: &AudioEngineHandle, pred: impl Fn(&PlaybackStatus) -> bool) -> PlaybackStatus {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let status = handle.status();
            if pred(&status) || Instant::now() > deadline {
                return status;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn engine_tracks_load_play_and_stop() {
        let engine = AudioEngineHandle::new();
        engine.load("ambient:brown-noise").unwrap();
        engine.play().unwrap();
        engine.set_volume(0.25).unwrap();

        let status = wait_for(&engine, |s| s.playing && s.volume < 0.5);
        assert_eq!(status.loaded.as_deref(), Some("ambient:brown-noise"));
        assert!(status.playing);

        engine.stop().unwrap();
        let status = wait_for(&engine, |s| s.loaded.is_none());
        assert!(!status.playing);
    }

    #[test]
    fn play_without_load_stays_silent() {
        let engine = AudioEngineHandle::new();
        engine.play().unwrap();
        engine.set_volume(0.5).unwrap();

        let status = wait_for(&engine, |s| (s.volume - 0.5).abs() < f32::EPSILON);
        assert!(!status.playing);
    }
}
