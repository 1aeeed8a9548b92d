use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Monetary amount in minor currency units (paise).
pub type Money = i64;

/// Reserved id of the singleton house account. The house is the universal
/// counterparty for stakes and payouts and the only account allowed to go
/// negative.
pub const HOUSE_ACCOUNT_ID: &str = "house";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountRole {
    Admin,
    Dealer,
    User,
}

impl AccountRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountRole::Admin => "admin",
            AccountRole::Dealer => "dealer",
            AccountRole::User => "user",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(AccountRole::Admin),
            "dealer" => Some(AccountRole::Dealer),
            "user" => Some(AccountRole::User),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubGame {
    OneDigitOpen,
    OneDigitClose,
    TwoDigit,
}

impl SubGame {
    /// Required length of every wagered digit-string for this sub-game.
    pub fn digit_len(&self) -> usize {
        match self {
            SubGame::OneDigitOpen | SubGame::OneDigitClose => 1,
            SubGame::TwoDigit => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubGame::OneDigitOpen => "one_digit_open",
            SubGame::OneDigitClose => "one_digit_close",
            SubGame::TwoDigit => "two_digit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "one_digit_open" => Some(SubGame::OneDigitOpen),
            "one_digit_close" => Some(SubGame::OneDigitClose),
            "two_digit" => Some(SubGame::TwoDigit),
            _ => None,
        }
    }

    /// Short label used in ledger descriptions and table output.
    pub fn label(&self) -> &'static str {
        match self {
            SubGame::OneDigitOpen => "Open",
            SubGame::OneDigitClose => "Close",
            SubGame::TwoDigit => "Jodi",
        }
    }
}

/// Prize multipliers in hundredths of the stake per matched number
/// (950 = 9.5x).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrizeRates {
    pub one_digit_open: u32,
    pub one_digit_close: u32,
    pub two_digit: u32,
}

impl Default for PrizeRates {
    fn default() -> Self {
        Self {
            one_digit_open: 950,
            one_digit_close: 950,
            two_digit: 9500,
        }
    }
}

impl PrizeRates {
    pub fn rate_for(&self, sub_game: SubGame) -> u32 {
        match sub_game {
            SubGame::OneDigitOpen => self.one_digit_open,
            SubGame::OneDigitClose => self.one_digit_close,
            SubGame::TwoDigit => self.two_digit,
        }
    }
}

/// Optional per-sub-game cap on the amount wagered per number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetLimits {
    pub one_digit_open: Option<Money>,
    pub one_digit_close: Option<Money>,
    pub two_digit: Option<Money>,
}

impl BetLimits {
    pub fn limit_for(&self, sub_game: SubGame) -> Option<Money> {
        match sub_game {
            SubGame::OneDigitOpen => self.one_digit_open,
            SubGame::OneDigitClose => self.one_digit_close,
            SubGame::TwoDigit => self.two_digit,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub role: AccountRole,
    pub name: String,
    pub username: String,
    pub credential: String,
    pub wallet: Money,
    pub commission_bps: u32,
    pub prize_rates: PrizeRates,
    pub bet_limits: BetLimits,
    pub is_restricted: bool,
    pub dealer_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoupleRole {
    Open,
    Close,
}

impl CoupleRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoupleRole::Open => "open",
            CoupleRole::Close => "close",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(CoupleRole::Open),
            "close" => Some(CoupleRole::Close),
            _ => None,
        }
    }
}

/// Membership of a game in a coupled open/close pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoupleRef {
    pub pair_id: String,
    pub role: CoupleRole,
}

/// A declared result. The open half of a coupled pair holds
/// `PendingClose` until the close digit arrives; only `Final` values are
/// settleable. Persisted as text: `"5*"` for a pending open digit, the
/// plain digits otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WinningNumber {
    PendingClose(char),
    Final(String),
}

impl WinningNumber {
    pub fn is_final(&self) -> bool {
        matches!(self, WinningNumber::Final(_))
    }

    pub fn as_final(&self) -> Option<&str> {
        match self {
            WinningNumber::Final(s) => Some(s.as_str()),
            WinningNumber::PendingClose(_) => None,
        }
    }

    pub fn to_stored(&self) -> String {
        match self {
            WinningNumber::PendingClose(d) => format!("{}*", d),
            WinningNumber::Final(s) => s.clone(),
        }
    }

    pub fn from_stored(s: &str) -> Option<Self> {
        if let Some(rest) = s.strip_suffix('*') {
            let mut chars = rest.chars();
            match (chars.next(), chars.next()) {
                (Some(d), None) if d.is_ascii_digit() => {
                    return Some(WinningNumber::PendingClose(d));
                }
                _ => return None,
            }
        }
        if (1..=2).contains(&s.len()) && s.chars().all(|c| c.is_ascii_digit()) {
            return Some(WinningNumber::Final(s.to_string()));
        }
        None
    }
}

impl std::fmt::Display for WinningNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_stored())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub name: String,
    pub draw_time: NaiveTime,
    pub winning_number: Option<WinningNumber>,
    pub payouts_approved: bool,
    pub approved_at: Option<DateTime<Utc>>,
    pub couple: Option<CoupleRef>,
    pub created_at: DateTime<Utc>,
}

impl Game {
    pub fn is_coupled(&self) -> bool {
        self.couple.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bet {
    pub id: String,
    pub user_id: String,
    pub dealer_id: String,
    pub game_id: String,
    pub sub_game: SubGame,
    pub numbers: Vec<String>,
    pub amount_per_number: Money,
    pub total_amount: Money,
    pub created_at: DateTime<Utc>,
}

/// One group of numbers wagered on a single sub-game, as supplied by the
/// request layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetRequest {
    pub sub_game: SubGame,
    pub numbers: Vec<String>,
    pub amount_per_number: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub account_id: String,
    pub account_role: AccountRole,
    pub description: String,
    pub debit: Money,
    pub credit: Money,
    pub balance: Money,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferDirection {
    Deposit,
    Withdraw,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementSummary {
    pub game: Game,
    pub bets_settled: usize,
    pub winning_bets: usize,
    pub total_user_prizes: Money,
    pub total_dealer_profit: Money,
}

/// Render minor units as "rupees.paise".
pub fn format_money(amount: Money) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Parse "rupees" or "rupees.paise" into minor units. Rejects negatives
/// and more than two decimal places.
pub fn parse_money(s: &str) -> Option<Money> {
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() || whole.chars().any(|c| !c.is_ascii_digit()) {
        return None;
    }
    if frac.len() > 2 || frac.chars().any(|c| !c.is_ascii_digit()) {
        return None;
    }
    let whole: Money = whole.parse().ok()?;
    let frac_value: Money = if frac.is_empty() {
        0
    } else {
        let parsed: Money = frac.parse().ok()?;
        if frac.len() == 1 {
            parsed * 10
        } else {
            parsed
        }
    };
    whole.checked_mul(100)?.checked_add(frac_value)
}
