use crossterm::event::KeyCode;
use funding_data::{ExchangeId, RateStyleRule};

/// Symbols added or removed per `+` / `-` press.
pub const SYMBOL_LIMIT_STEP: usize = 10;

/// Side effect requested by a key press, applied by the binary's event loop.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Action {
    Quit,
    Refresh,
    SetSymbolLimit(usize),
}

/// Interactive dashboard state. Holds only what the operator controls, funding data is read
/// fresh from the store on every frame.
#[derive(Clone, Debug, PartialEq)]
pub struct App {
    pub exchanges: Vec<ExchangeId>,
    pub selected: usize,
    pub show_mark_prices: bool,
    /// Maximum symbols per batch, 0 meaning unlimited.
    pub symbol_limit: usize,
    pub scroll: usize,
    pub rate_style: RateStyleRule,
}

impl App {
    pub fn new(exchanges: Vec<ExchangeId>, rate_style: RateStyleRule, symbol_limit: usize) -> Self {
        Self {
            exchanges,
            selected: 0,
            show_mark_prices: false,
            symbol_limit,
            scroll: 0,
            rate_style,
        }
    }

    pub fn selected_exchange(&self) -> Option<ExchangeId> {
        self.exchanges.get(self.selected).copied()
    }

    pub fn handle_key(&mut self, key: KeyCode) -> Option<Action> {
        match key {
            KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
            KeyCode::Char('r') => Some(Action::Refresh),
            KeyCode::Char('+') | KeyCode::Char('=') => {
                self.symbol_limit = self.symbol_limit.saturating_add(SYMBOL_LIMIT_STEP);
                Some(Action::SetSymbolLimit(self.symbol_limit))
            }
            KeyCode::Char('-') => {
                self.symbol_limit = self.symbol_limit.saturating_sub(SYMBOL_LIMIT_STEP);
                Some(Action::SetSymbolLimit(self.symbol_limit))
            }
            KeyCode::Char('0') => {
                self.symbol_limit = 0;
                Some(Action::SetSymbolLimit(0))
            }
            KeyCode::Tab => {
                if !self.exchanges.is_empty() {
                    self.selected = (self.selected + 1) % self.exchanges.len();
                    self.scroll = 0;
                }
                None
            }
            KeyCode::BackTab => {
                if !self.exchanges.is_empty() {
                    self.selected = (self.selected + self.exchanges.len() - 1) % self.exchanges.len();
                    self.scroll = 0;
                }
                None
            }
            KeyCode::Char('m') => {
                self.show_mark_prices = !self.show_mark_prices;
                self.scroll = 0;
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.scroll = self.scroll.saturating_add(1);
                None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.scroll = self.scroll.saturating_sub(1);
                None
            }
            KeyCode::Home => {
                self.scroll = 0;
                None
            }
            _ => None,
        }
    }

    pub fn symbol_limit_label(&self) -> String {
        match self.symbol_limit {
            0 => "unlimited".to_string(),
            limit => limit.to_string(),
        }
    }
}
