use std::{
    fmt,
    num::{ParseIntError, TryFromIntError},
    str::FromStr,
};

use thiserror::Error;

/// A fire-and-forget command for the drone. The text form is the Tello SDK
/// vocabulary, so a command can be written straight onto the control socket
/// or parsed out of a free-form reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightCommand {
    SetVideoEncoderRate(u8),
    StartVideo,
    TakeOff,
    /// Rotate by `angle` degrees; positive is clockwise.
    Rotate { angle: i32 },
    /// Move forward by `distance` centimeters.
    MoveForward { distance: u32 },
    Land,
}

impl fmt::Display for FlightCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlightCommand::SetVideoEncoderRate(rate) => write!(f, "setbitrate {rate}"),
            FlightCommand::StartVideo => f.write_str("streamon"),
            FlightCommand::TakeOff => f.write_str("takeoff"),
            FlightCommand::Rotate { angle } if *angle < 0 => write!(f, "ccw {}", angle.unsigned_abs()),
            FlightCommand::Rotate { angle } => write!(f, "cw {angle}"),
            FlightCommand::MoveForward { distance } => write!(f, "forward {distance}"),
            FlightCommand::Land => f.write_str("land"),
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseCommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}'")]
    Unknown(String),
    #[error("command '{0}' requires an argument")]
    MissingArgument(&'static str),
    #[error("invalid argument for command '{command}'")]
    InvalidArgument {
        command: &'static str,
        #[source]
        source: ParseIntError,
    },
    #[error("argument for command '{command}' is out of range")]
    OutOfRange {
        command: &'static str,
        #[source]
        source: TryFromIntError,
    },
}

impl FromStr for FlightCommand {
    type Err = ParseCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let mut words = lowered.split_whitespace();

        let keyword = words.next().ok_or(ParseCommandError::Empty)?;

        let command = match keyword {
            "streamon" => FlightCommand::StartVideo,
            "takeoff" => FlightCommand::TakeOff,
            "land" => FlightCommand::Land,
            "setbitrate" => FlightCommand::SetVideoEncoderRate(argument("setbitrate", words.next())?),
            "cw" => FlightCommand::Rotate {
                angle: degrees("cw", words.next())?,
            },
            "ccw" => FlightCommand::Rotate {
                angle: -degrees("ccw", words.next())?,
            },
            "forward" => FlightCommand::MoveForward {
                distance: argument("forward", words.next())?,
            },
            other => return Err(ParseCommandError::Unknown(other.to_owned())),
        };

        Ok(command)
    }
}

fn argument<T: FromStr<Err = ParseIntError>>(
    command: &'static str,
    word: Option<&str>,
) -> Result<T, ParseCommandError> {
    word.ok_or(ParseCommandError::MissingArgument(command))?
        .parse()
        .map_err(|source| ParseCommandError::InvalidArgument { command, source })
}

/// Rotation amounts are unsigned in the text form; the direction is the
/// keyword.
fn degrees(command: &'static str, word: Option<&str>) -> Result<i32, ParseCommandError> {
    let degrees: u32 = argument(command, word)?;

    i32::try_from(degrees).map_err(|source| ParseCommandError::OutOfRange { command, source })
}
