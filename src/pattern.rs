//! File name patterns.
//!
//! A pattern is literal text interleaved with tokens. `{d(%Y-%m-%d)}`
//! renders the instant with a chrono strftime format, in the local zone
//! unless a fixed offset is attached: `{d(%Y-%m-%d)(+05:30)}`. `{i}` is the
//! integer-sequence token of the size-and-index policy family and is never
//! substituted here. Literal braces are written `{{` and `}}`. A trailing
//! `.gz` or `.zip` names the compression applied after rollover and can be
//! excluded from a render.

use std::iter::Peekable;
use std::str::CharIndices;

use chrono::format::{Item, StrftimeItems};
use chrono::{FixedOffset, Local, LocalResult, TimeZone, Utc};
use thiserror::Error;

const COMPRESSION_SUFFIXES: &[&str] = &[".gz", ".zip"];

/// The first date token of a pattern: a chrono strftime format plus an
/// optional fixed-offset zone.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct DateToken {
    pub date_format: String,
    pub zone: Option<FixedOffset>,
}

/// The naming collaborator: renders an instant into a concrete file name.
///
/// Implementations must be deterministic in the instant and the configured
/// pattern, and must substitute date tokens with the same rules the
/// calendar uses to place period boundaries.
pub trait FileNamePattern: Send + Sync {
    /// Renders the file name for `millis`.
    fn render(&self, millis: i64) -> String;

    /// Renders the file name for `millis` with any trailing compression
    /// suffix left off.
    fn render_without_compression_suffix(&self, millis: i64) -> String;

    /// True when the pattern contains an `{i}` integer-sequence token.
    fn has_integer_token(&self) -> bool;

    /// The first date token of the pattern, if any.
    fn primary_date_token(&self) -> Option<DateToken>;

    /// The pattern text as configured.
    fn text(&self) -> &str;
}

/// A problem in the text of a file name pattern.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("unbalanced `}}` at byte {0} of the file name pattern")]
    UnbalancedBrace(usize),
    #[error("unterminated token at byte {0} of the file name pattern")]
    UnterminatedToken(usize),
    #[error("unrecognized token `{{{0}` in the file name pattern")]
    UnknownToken(char),
    #[error("date token has an empty format")]
    EmptyDateFormat,
    #[error("date format [{0}] is not a valid strftime format")]
    BadDateFormat(String),
    #[error("zone offset [{0}] is not of the form +HH:MM or -HH:MM")]
    BadZoneOffset(String),
}

#[derive(Clone, Eq, PartialEq, Debug)]
enum Segment {
    Literal(String),
    Date {
        format: String,
        zone: Option<FixedOffset>,
    },
    Index,
}

/// The provided [`FileNamePattern`] implementation.
#[derive(Clone, Debug)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
    compression_suffix: Option<&'static str>,
}

impl Pattern {
    /// Parses a file name pattern.
    pub fn new(pattern: &str) -> Result<Pattern, PatternError> {
        let segments = parse(pattern)?;
        let compression_suffix = match segments.last() {
            Some(Segment::Literal(text)) => COMPRESSION_SUFFIXES
                .iter()
                .copied()
                .find(|suffix| text.ends_with(suffix)),
            _ => None,
        };
        Ok(Pattern {
            raw: pattern.to_owned(),
            segments,
            compression_suffix,
        })
    }

    fn render_inner(&self, millis: i64, strip_compression: bool) -> String {
        let last = self.segments.len().saturating_sub(1);
        let mut out = String::new();
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(text) => {
                    if strip_compression && i == last {
                        if let Some(suffix) = self.compression_suffix {
                            out.push_str(&text[..text.len() - suffix.len()]);
                            continue;
                        }
                    }
                    out.push_str(text);
                }
                Segment::Date { format, zone } => {
                    out.push_str(&format_instant(millis, format, zone))
                }
                Segment::Index => out.push_str("{i}"),
            }
        }
        out
    }
}

impl FileNamePattern for Pattern {
    fn render(&self, millis: i64) -> String {
        self.render_inner(millis, false)
    }

    fn render_without_compression_suffix(&self, millis: i64) -> String {
        self.render_inner(millis, true)
    }

    fn has_integer_token(&self) -> bool {
        self.segments
            .iter()
            .any(|segment| matches!(segment, Segment::Index))
    }

    fn primary_date_token(&self) -> Option<DateToken> {
        self.segments.iter().find_map(|segment| match segment {
            Segment::Date { format, zone } => Some(DateToken {
                date_format: format.clone(),
                zone: *zone,
            }),
            _ => None,
        })
    }

    fn text(&self) -> &str {
        &self.raw
    }
}

fn format_instant(millis: i64, format: &str, zone: &Option<FixedOffset>) -> String {
    let utc = match Utc.timestamp_millis_opt(millis) {
        LocalResult::Single(ts) => ts,
        _ => return millis.to_string(),
    };
    match zone {
        Some(offset) => utc.with_timezone(offset).format(format).to_string(),
        None => utc.with_timezone(&Local).format(format).to_string(),
    }
}

type CharStream<'a> = Peekable<CharIndices<'a>>;

fn parse(pattern: &str) -> Result<Vec<Segment>, PatternError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = pattern.char_indices().peekable();

    while let Some((at, ch)) = chars.next() {
        match ch {
            '{' => {
                if matches!(chars.peek(), Some(&(_, '{'))) {
                    chars.next();
                    literal.push('{');
                    continue;
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(token(&mut chars, at)?);
            }
            '}' => {
                if matches!(chars.peek(), Some(&(_, '}'))) {
                    chars.next();
                    literal.push('}');
                } else {
                    return Err(PatternError::UnbalancedBrace(at));
                }
            }
            ch => literal.push(ch),
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

fn token(chars: &mut CharStream<'_>, at: usize) -> Result<Segment, PatternError> {
    match chars.next() {
        Some((_, 'i')) => match chars.next() {
            Some((_, '}')) => Ok(Segment::Index),
            _ => Err(PatternError::UnterminatedToken(at)),
        },
        Some((_, 'd')) => {
            expect(chars, '(', at)?;
            let format = delimited(chars, at)?;
            if format.is_empty() {
                return Err(PatternError::EmptyDateFormat);
            }
            if StrftimeItems::new(&format).any(|item| matches!(item, Item::Error)) {
                return Err(PatternError::BadDateFormat(format));
            }
            let zone = if matches!(chars.peek(), Some(&(_, '('))) {
                chars.next();
                Some(parse_zone(&delimited(chars, at)?)?)
            } else {
                None
            };
            expect(chars, '}', at)?;
            Ok(Segment::Date { format, zone })
        }
        Some((_, other)) => Err(PatternError::UnknownToken(other)),
        None => Err(PatternError::UnterminatedToken(at)),
    }
}

fn expect(chars: &mut CharStream<'_>, want: char, at: usize) -> Result<(), PatternError> {
    match chars.next() {
        Some((_, ch)) if ch == want => Ok(()),
        _ => Err(PatternError::UnterminatedToken(at)),
    }
}

fn delimited(chars: &mut CharStream<'_>, at: usize) -> Result<String, PatternError> {
    let mut text = String::new();
    loop {
        match chars.next() {
            Some((_, ')')) => return Ok(text),
            Some((_, ch)) => text.push(ch),
            None => return Err(PatternError::UnterminatedToken(at)),
        }
    }
}

fn parse_zone(text: &str) -> Result<FixedOffset, PatternError> {
    let bad = || PatternError::BadZoneOffset(text.to_owned());
    let (sign, rest) = match text.as_bytes().first() {
        Some(b'+') => (1, &text[1..]),
        Some(b'-') => (-1, &text[1..]),
        _ => return Err(bad()),
    };
    let mut parts = rest.splitn(2, ':');
    let hours: i32 = parts
        .next()
        .and_then(|h| h.parse().ok())
        .ok_or_else(bad)?;
    let minutes: i32 = parts
        .next()
        .and_then(|m| m.parse().ok())
        .ok_or_else(bad)?;
    if !(0..=23).contains(&hours) || !(0..=59).contains(&minutes) {
        return Err(bad());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(bad)
}

#[cfg(test)]
mod test {
    use super::*;

    fn noon() -> i64 {
        Utc.with_ymd_and_hms(2020, 8, 1, 12, 30, 45)
            .unwrap()
            .timestamp_millis()
    }

    #[test]
    fn renders_date_token_in_fixed_zone() {
        let pattern = Pattern::new("app-{d(%Y-%m-%d)(+00:00)}.log").unwrap();
        assert_eq!(pattern.render(noon()), "app-2020-08-01.log");
    }

    #[test]
    fn renders_date_token_with_offset() {
        let pattern = Pattern::new("app-{d(%Y-%m-%d %H)(+05:30)}.log").unwrap();
        assert_eq!(pattern.render(noon()), "app-2020-08-01 18.log");
    }

    #[test]
    fn compression_suffix_is_excluded_on_request() {
        let pattern = Pattern::new("app-{d(%Y-%m-%d)(+00:00)}.log.gz").unwrap();
        assert_eq!(pattern.render(noon()), "app-2020-08-01.log.gz");
        assert_eq!(
            pattern.render_without_compression_suffix(noon()),
            "app-2020-08-01.log"
        );
    }

    #[test]
    fn plain_pattern_is_unchanged_without_suffix() {
        let pattern = Pattern::new("app-{d(%Y-%m-%d)(+00:00)}.log").unwrap();
        assert_eq!(
            pattern.render_without_compression_suffix(noon()),
            pattern.render(noon())
        );
    }

    #[test]
    fn integer_token_is_detected_and_never_substituted() {
        let pattern = Pattern::new("app-{d(%Y-%m-%d)(+00:00)}-{i}.log").unwrap();
        assert!(pattern.has_integer_token());
        assert_eq!(pattern.render(noon()), "app-2020-08-01-{i}.log");

        let dated = Pattern::new("app-{d(%Y-%m-%d)}.log").unwrap();
        assert!(!dated.has_integer_token());
    }

    #[test]
    fn primary_date_token_reports_format_and_zone() {
        let pattern = Pattern::new("{d(%Y-%m)(+05:30)}-{d(%d)}.log").unwrap();
        let token = pattern.primary_date_token().unwrap();
        assert_eq!(token.date_format, "%Y-%m");
        assert_eq!(token.zone, Some(FixedOffset::east_opt(5 * 3600 + 1800).unwrap()));

        assert!(Pattern::new("app.log").unwrap().primary_date_token().is_none());
    }

    #[test]
    fn braces_escape_to_literals() {
        let pattern = Pattern::new("app-{{literal}}-{d(%Y)(+00:00)}{d(%m)(+00:00)}.log").unwrap();
        assert_eq!(pattern.render(noon()), "app-{literal}-202008.log");
    }

    #[test]
    fn text_returns_the_configured_pattern() {
        let raw = "app-{d(%Y-%m-%d)}.log.gz";
        assert_eq!(Pattern::new(raw).unwrap().text(), raw);
    }

    #[test]
    fn malformed_patterns_are_rejected() {
        assert!(matches!(
            Pattern::new("app-}.log"),
            Err(PatternError::UnbalancedBrace(_))
        ));
        assert!(matches!(
            Pattern::new("app-{d(%Y"),
            Err(PatternError::UnterminatedToken(_))
        ));
        assert!(matches!(
            Pattern::new("app-{x}.log"),
            Err(PatternError::UnknownToken('x'))
        ));
        assert!(matches!(
            Pattern::new("app-{d()}.log"),
            Err(PatternError::EmptyDateFormat)
        ));
        assert!(matches!(
            Pattern::new("app-{d(%Q)}.log"),
            Err(PatternError::BadDateFormat(_))
        ));
        assert!(matches!(
            Pattern::new("app-{d(%Y)(05:30)}.log"),
            Err(PatternError::BadZoneOffset(_))
        ));
        assert!(matches!(
            Pattern::new("app-{d(%Y)(+99:00)}.log"),
            Err(PatternError::BadZoneOffset(_))
        ));
    }

    #[test]
    fn zone_offsets_parse_in_both_directions() {
        let east = Pattern::new("{d(%H)(+05:30)}").unwrap();
        let west = Pattern::new("{d(%H)(-08:00)}").unwrap();
        assert_eq!(east.primary_date_token().unwrap().zone, FixedOffset::east_opt(19_800));
        assert_eq!(west.primary_date_token().unwrap().zone, FixedOffset::west_opt(28_800));
    }
}
