//! UI strings. Italian entries fall back to English when missing.

use crate::words::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Msg {
    Attempt,
    TimeLeft,
    Points,
    Draw,
    Analysing,
    Recognized,
    Correct,
    Incorrect,
    NotRecognized,
    GameOver,
    FinalScore,
    SaveFailed,
    Pen,
    Eraser,
    HintsPlaying,
    HintsGameOver,
    Leaderboard,
    Position,
    Player,
    Score,
    LastPlayed,
    You,
    EmptyLeaderboard,
    ShareText,
}

fn english(msg: Msg) -> &'static str {
    match msg {
        Msg::Attempt => "Attempt",
        Msg::TimeLeft => "Time left",
        Msg::Points => "Points",
        Msg::Draw => "Draw",
        Msg::Analysing => "analysing...",
        Msg::Recognized => "I see",
        Msg::Correct => "Correct!",
        Msg::Incorrect => "Wrong",
        Msg::NotRecognized => "Not recognized",
        Msg::GameOver => "Game over",
        Msg::FinalScore => "You scored {{score}} out of {{max}}",
        Msg::SaveFailed => "Score could not be saved: {{reason}}",
        Msg::Pen => "pen",
        Msg::Eraser => "eraser",
        Msg::HintsPlaying => "arrows/mouse draw · space paint · p pen · e eraser · c clear · enter submit · tab language · l leaderboard · esc quit",
        Msg::HintsGameOver => "r play again · tab language · l leaderboard · t share · esc quit",
        Msg::Leaderboard => "Leaderboard",
        Msg::Position => "#",
        Msg::Player => "Player",
        Msg::Score => "Score",
        Msg::LastPlayed => "Last played",
        Msg::You => "(you)",
        Msg::EmptyLeaderboard => "Nobody has played yet",
        Msg::ShareText => "I scored {{score}}/{{max}} drawing for an AI on screebai!",
    }
}

fn italian(msg: Msg) -> Option<&'static str> {
    let s = match msg {
        Msg::Attempt => "Tentativo",
        Msg::TimeLeft => "Tempo",
        Msg::Points => "Punti",
        Msg::Draw => "Disegna",
        Msg::Analysing => "sto analizzando...",
        Msg::Recognized => "Vedo",
        Msg::Correct => "Giusto!",
        Msg::Incorrect => "Sbagliato",
        Msg::NotRecognized => "Non riconosciuto",
        Msg::GameOver => "Partita finita",
        Msg::FinalScore => "Hai fatto {{score}} su {{max}}",
        Msg::SaveFailed => "Impossibile salvare il punteggio: {{reason}}",
        Msg::Pen => "penna",
        Msg::Eraser => "gomma",
        Msg::HintsPlaying => "frecce/mouse disegna · spazio colora · p penna · e gomma · c cancella · invio consegna · tab lingua · l classifica · esc esci",
        Msg::HintsGameOver => "r rigioca · tab lingua · l classifica · t condividi · esc esci",
        Msg::Leaderboard => "Classifica",
        Msg::Player => "Giocatore",
        Msg::Score => "Punti",
        Msg::LastPlayed => "Ultima partita",
        Msg::You => "(tu)",
        Msg::EmptyLeaderboard => "Ancora nessun giocatore",
        Msg::ShareText => "Ho fatto {{score}}/{{max}} disegnando per un'IA su screebai!",
        Msg::Position => return None,
    };
    Some(s)
}

pub fn t(language: Language, msg: Msg) -> &'static str {
    match language {
        Language::English => english(msg),
        Language::Italian => italian(msg).unwrap_or_else(|| english(msg)),
    }
}

/// Translate and fill `{{name}}` placeholders
pub fn tf(language: Language, msg: Msg, params: &[(&str, String)]) -> String {
    params
        .iter()
        .fold(t(language, msg).to_string(), |text, (name, value)| {
            text.replace(&format!("{{{{{name}}}}}"), value)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_italian_translation() {
        assert_eq!(t(Language::Italian, Msg::GameOver), "Partita finita");
        assert_eq!(t(Language::English, Msg::GameOver), "Game over");
    }

    #[test]
    fn test_missing_italian_falls_back() {
        assert_eq!(t(Language::Italian, Msg::Position), "#");
    }

    #[test]
    fn test_placeholders() {
        let text = tf(
            Language::English,
            Msg::FinalScore,
            &[("score", "3".into()), ("max", "5".into())],
        );
        assert_eq!(text, "You scored 3 out of 5");
    }

    #[test]
    fn test_unknown_placeholder_is_left_alone() {
        let text = tf(Language::Italian, Msg::SaveFailed, &[]);
        assert!(text.contains("{{reason}}"));
    }
}
