//! Text commands accepted while a session is on screen.

use std::str::FromStr;

use crate::{
    session::SessionController,
    ui::{Control, SessionView},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionCommand {
    Pause,
    Resume,
    Stop,
    Mute,
    Unmute,
    Volume(f32),
    Status,
    Help,
}

impl FromStr for SessionCommand {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut parts = input.split_whitespace();
        let head = parts.next().unwrap_or_default();

        let command = match head.to_lowercase().as_str() {
            "p" | "pause" => SessionCommand::Pause,
            "r" | "resume" => SessionCommand::Resume,
            "s" | "stop" | "q" | "quit" => SessionCommand::Stop,
            "m" | "mute" => SessionCommand::Mute,
            "u" | "unmute" => SessionCommand::Unmute,
            "v" | "volume" => {
                let raw = parts
                    .next()
                    .ok_or_else(|| "volume needs a value between 0 and 1".to_string())?;
                let volume = raw
                    .parse::<f32>()
                    .map_err(|_| format!("'{raw}' is not a number"))?;
                SessionCommand::Volume(volume)
            }
            "" | "?" | "status" => SessionCommand::Status,
            "h" | "help" => SessionCommand::Help,
            label => match Control::from_label(label) {
                Some(Control::Pause) => SessionCommand::Pause,
                Some(Control::Resume) => SessionCommand::Resume,
                Some(Control::Stop) => SessionCommand::Stop,
                Some(Control::Mute) => SessionCommand::Mute,
                Some(Control::Unmute) => SessionCommand::Unmute,
                _ => return Err(format!("unknown command '{head}'")),
            },
        };
        Ok(command)
    }
}

pub const HELP: &str = "p=pause r=resume s=stop m=mute u=unmute v <0..1>=volume ?=status";

/// Applies one command and returns the view the UI should render next.
pub async fn execute(
    controller: &SessionController,
    command: SessionCommand,
) -> Result<SessionView, String> {
    match command {
        SessionCommand::Pause => {
            controller.pause().await;
        }
        SessionCommand::Resume => {
            controller.resume().await;
        }
        SessionCommand::Stop => {
            controller.stop().await;
        }
        SessionCommand::Mute => {
            controller.set_muted(true).await.map_err(|e| e.to_string())?;
        }
        SessionCommand::Unmute => {
            controller.set_muted(false).await.map_err(|e| e.to_string())?;
        }
        SessionCommand::Volume(volume) => {
            controller
                .set_volume(volume)
                .await
                .map_err(|e| e.to_string())?;
        }
        SessionCommand::Status | SessionCommand::Help => {}
    }
    Ok(controller.view().await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_long_and_japanese_forms() {
        assert_eq!("p".parse::<SessionCommand>().unwrap(), SessionCommand::Pause);
        assert_eq!("RESUME".parse::<SessionCommand>().unwrap(), SessionCommand::Resume);
        assert_eq!("一時停止".parse::<SessionCommand>().unwrap(), SessionCommand::Pause);
        assert_eq!("ミュート解除".parse::<SessionCommand>().unwrap(), SessionCommand::Unmute);
        assert_eq!("".parse::<SessionCommand>().unwrap(), SessionCommand::Status);
        assert_eq!(
            "v 0.3".parse::<SessionCommand>().unwrap(),
            SessionCommand::Volume(0.3)
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!("volume".parse::<SessionCommand>().is_err());
        assert!("v loud".parse::<SessionCommand>().is_err());
        assert!("dance".parse::<SessionCommand>().is_err());
    }
}
