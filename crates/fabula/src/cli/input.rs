//! Parsing of interactive input lines.

use fabula_story::{RankEntry, SessionSettings};

/// What one line of input asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// Blank line
    Empty,
    /// The configured end word
    End,
    /// `:story`
    Story,
    /// `:progress`
    Progress,
    /// `:help`
    Help,
    /// `:revise N text`
    Revise {
        /// Chapter to revise
        target: usize,
        /// Replacement feature text
        text: String,
    },
    /// A malformed `:` command
    Invalid(String),
    /// Anything else is a feature for the next chapter
    Feature(String),
}

/// Classify a line of input.
pub fn parse_line(line: &str, settings: &SessionSettings) -> Line {
    let line = line.trim();
    if line.is_empty() {
        return Line::Empty;
    }
    if settings.is_end_command(line) {
        return Line::End;
    }
    let Some(command) = line.strip_prefix(':') else {
        return Line::Feature(line.to_string());
    };

    let mut parts = command.splitn(3, char::is_whitespace);
    match parts.next().unwrap_or_default() {
        "story" => Line::Story,
        "progress" => Line::Progress,
        "help" => Line::Help,
        "revise" => {
            let target = parts.next().and_then(|n| n.parse::<usize>().ok());
            let text = parts.next().map(str::trim).unwrap_or_default();
            match target {
                Some(target) if !text.is_empty() => Line::Revise {
                    target,
                    text: text.to_string(),
                },
                _ => Line::Invalid("usage: :revise <chapter> <feature text>".to_string()),
            }
        }
        other => Line::Invalid(format!("unknown command ':{}'", other)),
    }
}

/// Turn "2, 1, 3" (feature numbers, best first) into rank entries.
///
/// Numbers refer to the 1-based positions in `features`. Whether the result
/// is a valid permutation is left to ranking validation.
pub fn parse_ordering(line: &str, features: &[String]) -> Result<Vec<RankEntry>, String> {
    line.split([',', ' '])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .enumerate()
        .map(|(position, number)| {
            let n: usize = number
                .parse()
                .map_err(|_| format!("'{}' is not a feature number", number))?;
            let feature = n
                .checked_sub(1)
                .and_then(|i| features.get(i))
                .ok_or_else(|| format!("there is no feature {}", n))?;
            Ok(RankEntry::new(feature.clone(), position as u32 + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_are_classified() {
        let settings = SessionSettings::default();
        assert_eq!(parse_line("   ", &settings), Line::Empty);
        assert_eq!(parse_line("EXIT", &settings), Line::End);
        assert_eq!(parse_line(":story", &settings), Line::Story);
        assert_eq!(
            parse_line("It should hum softly", &settings),
            Line::Feature("It should hum softly".to_string())
        );
        assert_eq!(
            parse_line(":revise 2 It should sing instead", &settings),
            Line::Revise {
                target: 2,
                text: "It should sing instead".to_string()
            }
        );
        assert!(matches!(parse_line(":revise two", &settings), Line::Invalid(_)));
        assert!(matches!(parse_line(":dance", &settings), Line::Invalid(_)));
    }

    #[test]
    fn test_ordering_maps_positions_to_ranks() {
        let features = vec!["F1".to_string(), "F2".to_string(), "F3".to_string()];
        let entries = parse_ordering("2, 1 3", &features).unwrap();
        assert_eq!(
            entries,
            vec![
                RankEntry::new("F2", 1),
                RankEntry::new("F1", 2),
                RankEntry::new("F3", 3)
            ]
        );
        assert!(parse_ordering("2, x", &features).is_err());
        assert!(parse_ordering("4", &features).is_err());
    }
}
