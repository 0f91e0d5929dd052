use chrono::Local;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use screebai::canvas::Tool;
use screebai::i18n::{t, tf, Msg};
use screebai::leaderboard::select_window;
use screebai::session::{Status, Verdict};

use crate::{App, Screen};

const HORIZONTAL_MARGIN: u16 = 2;
const INK: &str = "█";
const LOW_TIME_SECS: u32 = 10;

/// Status bar, word/result panel, canvas, tool bar
fn chunks(area: Rect) -> [Rect; 4] {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(2),
        ])
        .split(area);
    [rows[0], rows[1], rows[2], rows[3]]
}

fn canvas_block() -> Block<'static> {
    Block::default().borders(Borders::ALL)
}

/// Screen cells the drawing grid occupies for a terminal of size `area`
pub fn canvas_area(area: Rect) -> Rect {
    canvas_block().inner(chunks(area)[2])
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.screen {
            Screen::Playing => self.render_game(area, buf),
            Screen::Leaderboard => self.render_leaderboard(area, buf),
        }
    }
}

impl App {
    fn render_game(&self, area: Rect, buf: &mut Buffer) {
        let lang = self.engine.language();
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let dim = Style::default().add_modifier(Modifier::DIM);
        let [status_area, word_area, canvas_chunk, tools_area] = chunks(area);

        let settings = self.engine.settings();
        let attempt = (self.engine.attempts_completed() + 1).min(settings.max_attempts);
        let mut status = vec![
            Span::styled(format!("{} ", t(lang, Msg::Attempt)), dim),
            Span::styled(format!("{attempt}/{}", settings.max_attempts), bold),
        ];
        if let Some(secs) = self.engine.time_remaining() {
            let style = if secs <= LOW_TIME_SECS {
                bold.fg(Color::Red)
            } else {
                bold
            };
            status.push(Span::styled(format!("   {} ", t(lang, Msg::TimeLeft)), dim));
            status.push(Span::styled(format!("{secs}s"), style));
        }
        status.push(Span::styled(format!("   {} ", t(lang, Msg::Points)), dim));
        status.push(Span::styled(self.engine.score_total().to_string(), bold));

        let used: usize = status.iter().map(|s| s.content.width()).sum();
        let pad = (status_area.width as usize).saturating_sub(used + self.player.width());
        status.push(Span::raw(" ".repeat(pad)));
        status.push(Span::styled(self.player.clone(), dim));
        Paragraph::new(Line::from(status)).render(status_area, buf);

        if self.engine.status() == Status::GameOver {
            self.render_game_over(word_area.union(canvas_chunk), buf);
        } else {
            self.word_panel().render(word_area, buf);
            let block = canvas_block();
            let inner = block.inner(canvas_chunk);
            block.render(canvas_chunk, buf);
            self.render_canvas(inner, buf);
        }

        let tool = match self.canvas.tool {
            Tool::Pen => t(lang, Msg::Pen),
            Tool::Eraser => t(lang, Msg::Eraser),
        };
        let hints = if self.engine.status() == Status::GameOver {
            t(lang, Msg::HintsGameOver)
        } else {
            t(lang, Msg::HintsPlaying)
        };
        Paragraph::new(vec![
            Line::from(Span::styled(format!("✎ {tool}"), bold.fg(Color::Cyan))),
            Line::from(Span::styled(hints, dim.add_modifier(Modifier::ITALIC))),
        ])
        .render(tools_area, buf);
    }

    fn word_panel(&self) -> Paragraph<'_> {
        let lang = self.engine.language();
        let bold = Style::default().add_modifier(Modifier::BOLD);

        let lines = if self.engine.is_analyzing() {
            vec![Line::from(Span::styled(
                t(lang, Msg::Analysing),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::ITALIC),
            ))]
        } else if let Some(verdict) = self.engine.verdict() {
            match (verdict.label(), verdict) {
                (Some(label), _) => {
                    let badge = if verdict.is_correct() {
                        Span::styled(t(lang, Msg::Correct), bold.fg(Color::Green))
                    } else {
                        Span::styled(t(lang, Msg::Incorrect), bold.fg(Color::Red))
                    };
                    vec![
                        Line::from(vec![
                            Span::raw(format!("{}: ", t(lang, Msg::Recognized))),
                            Span::styled(label.to_string(), bold),
                        ]),
                        Line::from(badge),
                    ]
                }
                (None, Verdict::Unrecognized { reason }) => vec![
                    Line::from(Span::styled(
                        t(lang, Msg::NotRecognized),
                        bold.fg(Color::Yellow),
                    )),
                    Line::from(Span::styled(
                        reason.clone(),
                        Style::default().add_modifier(Modifier::DIM),
                    )),
                ],
                (None, _) => Vec::new(),
            }
        } else {
            let word = self.engine.current_word().unwrap_or_default().to_uppercase();
            vec![Line::from(vec![
                Span::raw(format!("{}: ", t(lang, Msg::Draw))),
                Span::styled(word, bold.fg(Color::Magenta)),
            ])]
        };

        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
    }

    fn render_canvas(&self, area: Rect, buf: &mut Buffer) {
        let cursor_style = Style::default().fg(Color::Black).bg(Color::Cyan);
        for y in 0..area.height.min(self.canvas.height()) {
            for x in 0..area.width.min(self.canvas.width()) {
                let Some(cell) = buf.cell_mut((area.x + x, area.y + y)) else {
                    continue;
                };
                if self.canvas.is_inked(x, y) {
                    cell.set_symbol(INK);
                }
                if (x, y) == self.cursor {
                    cell.set_style(cursor_style);
                    if !self.canvas.is_inked(x, y) {
                        cell.set_symbol("+");
                    }
                }
            }
        }
    }

    fn render_game_over(&self, area: Rect, buf: &mut Buffer) {
        let lang = self.engine.language();
        let bold = Style::default().add_modifier(Modifier::BOLD);

        let mut lines = vec![
            Line::from(Span::styled(t(lang, Msg::GameOver), bold.fg(Color::Magenta))),
            Line::default(),
            Line::from(Span::styled(
                tf(
                    lang,
                    Msg::FinalScore,
                    &[
                        ("score", self.engine.score_total().to_string()),
                        ("max", self.max_score().to_string()),
                    ],
                ),
                bold,
            )),
        ];
        if let Some(reason) = self.engine.persist_warning() {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(
                tf(lang, Msg::SaveFailed, &[("reason", reason.to_string())]),
                Style::default().fg(Color::Yellow),
            )));
        }

        let height = lines.len() as u16;
        let top = area.height.saturating_sub(height) / 2;
        let centered = Rect {
            y: area.y + top,
            height: height.min(area.height),
            ..area
        };
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(centered, buf);
    }

    fn render_leaderboard(&self, area: Rect, buf: &mut Buffer) {
        let lang = self.engine.language();
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let block = Block::default()
            .borders(Borders::ALL)
            .title(Span::styled(format!(" {} ", t(lang, Msg::Leaderboard)), bold));

        if self.leaderboard.is_empty() {
            Paragraph::new(t(lang, Msg::EmptyLeaderboard))
                .alignment(Alignment::Center)
                .block(block)
                .render(area, buf);
            return;
        }

        let now = Local::now();
        let rows = select_window(&self.leaderboard, Some(&self.player))
            .into_iter()
            .map(|entry| {
                let you = entry.nick == self.player;
                let nick = if you {
                    format!("{} {}", entry.nick, t(lang, Msg::You))
                } else {
                    entry.nick.clone()
                };
                let row = Row::new(vec![
                    Cell::from(entry.position.to_string()),
                    Cell::from(nick),
                    Cell::from(entry.score.to_string()),
                    Cell::from(entry.last_played(now)),
                ]);
                if you {
                    row.style(bold.fg(Color::Green))
                } else {
                    row
                }
            });

        let header = Row::new(vec![
            t(lang, Msg::Position),
            t(lang, Msg::Player),
            t(lang, Msg::Score),
            t(lang, Msg::LastPlayed),
        ])
        .style(bold.add_modifier(Modifier::DIM));

        Table::new(
            rows,
            [
                Constraint::Length(4),
                Constraint::Min(16),
                Constraint::Length(8),
                Constraint::Length(18),
            ],
        )
        .header(header)
        .block(block)
        .render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::test_app;
    use ratatui::{backend::TestBackend, Terminal};
    use screebai::leaderboard::LeaderboardEntry;
    use std::time::{Duration, Instant};

    fn draw(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal.draw(|f| f.render_widget(app, f.area())).unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn test_canvas_area_is_inside_the_frame() {
        let area = Rect::new(0, 0, 80, 24);
        let canvas = canvas_area(area);
        assert!(canvas.width > 0 && canvas.height > 0);
        assert!(canvas.right() <= area.right());
        assert!(canvas.bottom() <= area.bottom());
    }

    #[test]
    fn test_renders_word_timer_and_ink() {
        let mut app = test_app();
        app.engine.start_session(Instant::now());
        app.canvas.paint(3, 1);

        let content = draw(&app);
        let word = app.engine.current_word().unwrap().to_uppercase();
        assert!(content.contains(&word));
        assert!(content.contains("60s"));
        assert!(content.contains("1/5"));
        assert!(content.contains(INK));
    }

    #[test]
    fn test_renders_unrecognized_result() {
        let mut app = test_app();
        let t0 = Instant::now();
        app.engine.start_session(t0);
        app.submit(t0);
        // the test classifier has no API key and fails right away
        assert!(app
            .engine
            .wait_for_classification(Duration::from_secs(5), t0));

        let content = draw(&app);
        assert!(content.contains("Not recognized"));
    }

    #[test]
    fn test_renders_leaderboard_with_current_player() {
        let mut app = test_app();
        app.screen = Screen::Leaderboard;
        app.leaderboard = vec![LeaderboardEntry {
            position: 1,
            nick: app.player.clone(),
            score: 12,
            updated_at: Local::now(),
        }];

        let content = draw(&app);
        assert!(content.contains("Leaderboard"));
        assert!(content.contains("(you)"));
        assert!(content.contains("12"));
    }

    #[test]
    fn test_empty_leaderboard_message() {
        let mut app = test_app();
        app.screen = Screen::Leaderboard;
        assert!(draw(&app).contains("Nobody has played yet"));
    }
}
