//! Regex-based PGN transcript parsing.

use regex::Regex;

use crate::error::GameLoadError;
use crate::game_data::GameHeaders;

pub const STANDARD_START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Headers plus the raw SAN tokens of the main line.
#[derive(Debug, Clone)]
pub struct ParsedTranscript {
    pub headers: GameHeaders,
    pub moves: Vec<String>,
}

/// Parse a PGN (or bare SAN move text) into headers and SAN tokens.
///
/// Legality is not checked here; the timeline builder replays the tokens.
pub fn parse_pgn(pgn: &str) -> Result<ParsedTranscript, GameLoadError> {
    let header_re = Regex::new(r#"\[(\w+)\s+"([^"]*)"\]"#)?;

    let mut headers = GameHeaders::unknown();
    let mut setup = None;

    for cap in header_re.captures_iter(pgn) {
        let key = &cap[1];
        let value = cap[2].to_string();
        match key {
            "White" => headers.white = value,
            "Black" => headers.black = value,
            "Result" => headers.result = value,
            "Event" => headers.event = Some(value),
            "Date" => headers.date = Some(value),
            "ECO" => headers.eco = Some(value),
            "SetUp" => setup = Some(value),
            "FEN" => headers.start_fen = Some(value),
            _ => {}
        }
    }

    // A FEN tag without SetUp "1" is still honoured unless it is the standard start
    if setup.as_deref() == Some("0") || headers.start_fen.as_deref() == Some(STANDARD_START_FEN) {
        headers.start_fen = None;
    }

    let moves = extract_moves(pgn)?;
    if moves.is_empty() {
        return Err(GameLoadError::EmptyTranscript);
    }

    Ok(ParsedTranscript { headers, moves })
}

/// Extract SAN moves from PGN text (after removing headers, comments, variations).
fn extract_moves(pgn: &str) -> Result<Vec<String>, GameLoadError> {
    let header_re = Regex::new(r"\[[^\]]*\]")?;
    let no_headers = header_re.replace_all(pgn, "");

    let comment_re = Regex::new(r"\{[^}]*\}|;[^\n]*")?;
    let no_comments = comment_re.replace_all(&no_headers, "");

    // Innermost first so nested variations collapse
    let variation_re = Regex::new(r"\([^()]*\)")?;
    let mut text = no_comments.into_owned();
    while variation_re.is_match(&text) {
        text = variation_re.replace_all(&text, "").into_owned();
    }

    let move_re =
        Regex::new(r"[KQRBN]?[a-h]?[1-8]?x?[a-h][1-8](?:=[QRBN])?[+#]?|O-O-O[+#]?|O-O[+#]?")?;

    Ok(move_re
        .find_iter(&text)
        .map(|m| m.as_str().to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pgn_basic() {
        let pgn = r#"[White "Player1"]
[Black "Player2"]
[Result "1-0"]
[Date "2025.01.15"]

1. e4 e5 2. Nf3 Nc6 1-0"#;

        let game = parse_pgn(pgn).unwrap();
        assert_eq!(game.headers.white, "Player1");
        assert_eq!(game.headers.black, "Player2");
        assert_eq!(game.headers.result, "1-0");
        assert_eq!(game.headers.date.as_deref(), Some("2025.01.15"));
        assert_eq!(game.moves, vec!["e4", "e5", "Nf3", "Nc6"]);
    }

    #[test]
    fn test_comments_and_variations_stripped() {
        let pgn = "1. e4 {best by test} e5 (1... c5 2. Nf3 (2. c3)) 2. Nf3 $1 Nc6 ; trailing\n\
                   3. O-O-O+ *";
        let game = parse_pgn(pgn).unwrap();
        assert_eq!(game.moves, vec!["e4", "e5", "Nf3", "Nc6", "O-O-O+"]);
        assert_eq!(game.headers.white, "Unknown");
    }

    #[test]
    fn test_bare_san_text() {
        let game = parse_pgn("e4 c5 Nf3 d6").unwrap();
        assert_eq!(game.moves.len(), 4);
    }

    #[test]
    fn test_empty_transcript_rejected() {
        let err = parse_pgn("[Event \"Casual\"]\n\n*").unwrap_err();
        assert!(matches!(err, GameLoadError::EmptyTranscript));
    }

    #[test]
    fn test_fen_header_kept() {
        let pgn = r#"[SetUp "1"]
[FEN "6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1"]

1. Ra8#"#;
        let game = parse_pgn(pgn).unwrap();
        assert_eq!(
            game.headers.start_fen.as_deref(),
            Some("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1")
        );
    }
}
