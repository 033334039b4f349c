//! What the UI may show for a session, and the identifiers automated UI
//! tests locate elements by. The identifiers are a compatibility contract:
//! never rename them.

pub mod terminal;

use serde::Serialize;

use crate::{
    catalog::Script,
    session::{MeditationSession, SessionStatus},
};

pub use terminal::TerminalSurface;

pub mod test_ids {
    pub const SESSION_TIMER: &str = "session-timer";
    pub const START_BUTTON: &str = "start-button";
    pub const PAUSE_BUTTON: &str = "pause-button";
    pub const RESUME_BUTTON: &str = "resume-button";
    pub const STOP_BUTTON: &str = "stop-button";
    pub const MUTE_BUTTON: &str = "mute-button";
    pub const UNMUTE_BUTTON: &str = "unmute-button";
    pub const VOLUME_CONTROL: &str = "volume-control";
    pub const SCRIPT_CARD_PREFIX: &str = "script-card-";

    pub fn script_card(script_id: &str) -> String {
        format!("{SCRIPT_CARD_PREFIX}{script_id}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Control {
    Start,
    Pause,
    Resume,
    Stop,
    Mute,
    Unmute,
    Volume,
}

impl Control {
    pub const ALL: [Control; 7] = [
        Control::Start,
        Control::Pause,
        Control::Resume,
        Control::Stop,
        Control::Mute,
        Control::Unmute,
        Control::Volume,
    ];

    pub fn test_id(self) -> &'static str {
        match self {
            Control::Start => test_ids::START_BUTTON,
            Control::Pause => test_ids::PAUSE_BUTTON,
            Control::Resume => test_ids::RESUME_BUTTON,
            Control::Stop => test_ids::STOP_BUTTON,
            Control::Mute => test_ids::MUTE_BUTTON,
            Control::Unmute => test_ids::UNMUTE_BUTTON,
            Control::Volume => test_ids::VOLUME_CONTROL,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Control::Start => "開始",
            Control::Pause => "一時停止",
            Control::Resume => "再開",
            Control::Stop => "停止",
            Control::Mute => "ミュート",
            Control::Unmute => "ミュート解除",
            Control::Volume => "音量",
        }
    }

    pub fn from_label(label: &str) -> Option<Control> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }
}

/// Point-in-time answer to "which controls exist right now". Renderers and
/// tests query this instead of probing for elements that may be absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub status: SessionStatus,
    pub timer_text: String,
    pub controls: Vec<Control>,
    pub muted: bool,
    pub volume: f32,
}

impl SessionView {
    pub fn from_session(session: &MeditationSession) -> Self {
        let status = session.status();
        let mute_toggle = if session.muted() {
            Control::Unmute
        } else {
            Control::Mute
        };

        let controls = match status {
            SessionStatus::Idle => vec![Control::Start, mute_toggle, Control::Volume],
            SessionStatus::Running => {
                vec![Control::Pause, Control::Stop, mute_toggle, Control::Volume]
            }
            SessionStatus::Paused => {
                vec![Control::Resume, Control::Stop, mute_toggle, Control::Volume]
            }
            SessionStatus::Completed | SessionStatus::Stopped => Vec::new(),
        };

        Self {
            status,
            timer_text: format_clock(session.remaining_seconds()),
            controls,
            muted: session.muted(),
            volume: session.volume(),
        }
    }

    pub fn can(&self, control: Control) -> bool {
        self.controls.contains(&control)
    }

    /// Test identifiers of every element currently rendered, timer first.
    pub fn visible_test_ids(&self) -> Vec<&'static str> {
        std::iter::once(test_ids::SESSION_TIMER)
            .chain(self.controls.iter().map(|c| c.test_id()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptCard {
    pub test_id: String,
    pub script_id: String,
    pub title: String,
    pub duration_text: String,
}

pub fn script_cards(scripts: &[Script]) -> Vec<ScriptCard> {
    scripts
        .iter()
        .map(|script| ScriptCard {
            test_id: test_ids::script_card(&script.id),
            script_id: script.id.clone(),
            title: script.title.clone(),
            duration_text: format_clock(script.duration_seconds),
        })
        .collect()
}

/// `mm:ss`, or `h:mm:ss` from one hour up.
pub fn format_clock(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn running() -> MeditationSession {
        let mut session = MeditationSession::new();
        session
            .start("s".into(), "breathing-3".into(), 180, Utc::now())
            .unwrap();
        session
    }

    #[test]
    fn controls_follow_the_lifecycle() {
        let idle = SessionView::from_session(&MeditationSession::new());
        assert!(idle.can(Control::Start));
        assert!(!idle.can(Control::Pause));

        let mut session = running();
        let view = SessionView::from_session(&session);
        assert!(view.can(Control::Pause) && view.can(Control::Stop));
        assert!(!view.can(Control::Resume));
        assert_eq!(view.timer_text, "03:00");

        session.pause();
        let view = SessionView::from_session(&session);
        assert!(view.can(Control::Resume) && !view.can(Control::Pause));

        session.stop(Utc::now());
        let view = SessionView::from_session(&session);
        assert!(view.controls.is_empty());
        assert_eq!(view.visible_test_ids(), vec!["session-timer"]);
    }

    #[test]
    fn mute_button_swaps_with_unmute() {
        let mut session = running();
        assert!(SessionView::from_session(&session).can(Control::Mute));

        session.set_muted(true).unwrap();
        let view = SessionView::from_session(&session);
        assert!(view.can(Control::Unmute) && !view.can(Control::Mute));
        assert!(view.visible_test_ids().contains(&"unmute-button"));
    }

    #[test]
    fn identifiers_are_stable() {
        let ids: Vec<_> = Control::ALL.iter().map(|c| c.test_id()).collect();
        assert_eq!(
            ids,
            vec![
                "start-button",
                "pause-button",
                "resume-button",
                "stop-button",
                "mute-button",
                "unmute-button",
                "volume-control",
            ]
        );
        assert_eq!(test_ids::script_card("sleep-20"), "script-card-sleep-20");
    }

    #[test]
    fn labels_map_back_to_controls() {
        for control in Control::ALL {
            assert_eq!(Control::from_label(control.label()), Some(control));
        }
    }

    #[test]
    fn formats_clock() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(65), "01:05");
        assert_eq!(format_clock(3725), "1:02:05");
    }
}
