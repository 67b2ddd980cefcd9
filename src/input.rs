use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Command {
    StartStop,
    SelectTank(usize),
    FillSelected,
    EmptySelected,
    ShowInstallation,
    ShowReport,
    ToggleColor,
    HelpToggle,
    Back,
    Quit,
}

pub(crate) fn collect_input_nonblocking(max_frame_time: Duration) -> anyhow::Result<Vec<KeyCode>> {
    let mut out = Vec::new();

    // poll with a tiny timeout so we stay responsive
    let timeout = std::cmp::min(Duration::from_millis(1), max_frame_time);
    while event::poll(timeout)? {
        if let Event::Key(k) = event::read()? {
            if k.kind == KeyEventKind::Press || k.kind == KeyEventKind::Repeat {
                out.push(k.code);
                if out.len() >= 32 {
                    break;
                }
            }
        }
    }
    Ok(out)
}

pub(crate) fn map_key(help_open: bool, key: KeyCode) -> Option<Command> {
    match key {
        KeyCode::Char('q') | KeyCode::Char('Q') => return Some(Command::Quit),
        KeyCode::Char('h') | KeyCode::Char('H') => return Some(Command::HelpToggle),
        KeyCode::Esc => return Some(Command::Back),
        _ => {}
    }
    if help_open {
        return None;
    }

    match key {
        KeyCode::Char(' ') => Some(Command::StartStop),
        KeyCode::Char(d @ '1'..='9') => Some(Command::SelectTank(d as usize - '1' as usize)),
        KeyCode::Char('+') | KeyCode::Char('=') => Some(Command::FillSelected),
        KeyCode::Char('-') | KeyCode::Char('_') => Some(Command::EmptySelected),
        KeyCode::Char('t') | KeyCode::Char('T') => Some(Command::ShowInstallation),
        KeyCode::Char('r') | KeyCode::Char('R') => Some(Command::ShowReport),
        KeyCode::Char('c') | KeyCode::Char('C') => Some(Command::ToggleColor),
        KeyCode::Tab => Some(Command::ShowReport),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_select_zero_based_tanks() {
        assert_eq!(map_key(false, KeyCode::Char('1')), Some(Command::SelectTank(0)));
        assert_eq!(map_key(false, KeyCode::Char('4')), Some(Command::SelectTank(3)));
        assert_eq!(map_key(false, KeyCode::Char('0')), None);
    }

    #[test]
    fn simulation_keys() {
        assert_eq!(map_key(false, KeyCode::Char(' ')), Some(Command::StartStop));
        assert_eq!(map_key(false, KeyCode::Char('+')), Some(Command::FillSelected));
        assert_eq!(map_key(false, KeyCode::Char('=')), Some(Command::FillSelected));
        assert_eq!(map_key(false, KeyCode::Char('-')), Some(Command::EmptySelected));
        assert_eq!(map_key(false, KeyCode::Char('r')), Some(Command::ShowReport));
        assert_eq!(map_key(false, KeyCode::Char('t')), Some(Command::ShowInstallation));
    }

    #[test]
    fn help_swallows_everything_but_exits() {
        assert_eq!(map_key(true, KeyCode::Char(' ')), None);
        assert_eq!(map_key(true, KeyCode::Char('1')), None);
        assert_eq!(map_key(true, KeyCode::Esc), Some(Command::Back));
        assert_eq!(map_key(true, KeyCode::Char('h')), Some(Command::HelpToggle));
        assert_eq!(map_key(true, KeyCode::Char('q')), Some(Command::Quit));
    }
}
