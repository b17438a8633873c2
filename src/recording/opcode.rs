use std::fmt;
use std::str::FromStr;

/// One line of a macro file.
///
/// ```text
/// sleep(<n>)    wait n frames, n >= 1
/// p<name>       press
/// r<name>       release
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opcode {
    Sleep(u32),
    Press(String),
    Release(String),
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Opcode::Sleep(frames) => write!(f, "sleep({})", frames),
            Opcode::Press(name) => write!(f, "p{}", name),
            Opcode::Release(name) => write!(f, "r{}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OpcodeParseError {
    #[error("Empty line")]
    Empty,

    #[error("Malformed sleep: {0:?}")]
    MalformedSleep(String),

    #[error("Missing input name: {0:?}")]
    MissingName(String),

    #[error("Unknown opcode: {0:?}")]
    Unknown(String),
}

impl FromStr for Opcode {
    type Err = OpcodeParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        if line.is_empty() {
            return Err(OpcodeParseError::Empty);
        }

        if let Some(rest) = line.strip_prefix("sleep(") {
            let frames = rest
                .strip_suffix(')')
                .and_then(|n| n.parse::<u32>().ok())
                .filter(|n| *n > 0)
                .ok_or_else(|| OpcodeParseError::MalformedSleep(line.to_string()))?;
            return Ok(Opcode::Sleep(frames));
        }

        let mut chars = line.chars();
        let kind = chars.next();
        let name = chars.as_str();
        match kind {
            Some('p' | 'r') if name.is_empty() => {
                Err(OpcodeParseError::MissingName(line.to_string()))
            }
            Some('p') => Ok(Opcode::Press(name.to_string())),
            Some('r') => Ok(Opcode::Release(name.to_string())),
            _ => Err(OpcodeParseError::Unknown(line.to_string())),
        }
    }
}
