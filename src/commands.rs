//! # Command Parser
//!
//! Turns raw chat text and callback payloads into typed actions.
//!
//! ## Features
//!
//! - Case-insensitive command keywords, `/cmd@botname` accepted
//! - Space-delimited arguments with optional trailing ones (`/addp <email> [platform] [amount]`)
//! - Reply-keyboard menu labels ("Inventario", "Clientes", ...)
//! - Callback payloads for inline buttons (`RENOVÓ:<phone>:<platform>`, `ELIMINAR:<phone>`, ...)
//!
//! ## Usage
//!
//! ```rust
//! use streamslots::commands::{parse_input, Command, Input};
//!
//! let input = parse_input("/addp a@x.com disney 2").unwrap();
//! assert!(matches!(
//!     input,
//!     Input::Command(Command::TakeSlots { amount: 2, .. })
//! ));
//! ```

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

use crate::localization::{t, t_args};
use crate::model::{normalize_email, normalize_platform, SlotStatus};

/// Phone numbers: optional leading `+`, 3 to 15 digits once separators are stripped
static PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?\d{3,15}$").expect("phone pattern is valid"));

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

/// Telegram rejects callback data longer than this, in bytes
pub const MAX_CALLBACK_DATA_BYTES: usize = 64;
/// Longest email that still fits in `WZE:<email>`
pub const MAX_EMAIL_BYTES: usize = 60;
/// Longest platform that still fits in `RENOVÓ:<phone>:<platform>`
pub const MAX_PLATFORM_BYTES: usize = 32;

/// Prefix of the renewal callback payload
pub const RENEW_PREFIX: &str = "RENOVÓ";
/// Prefix of the customer deletion callback payload
pub const DELETE_PREFIX: &str = "ELIMINAR";

/// A parsed chat command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    /// `/add <email> <key> <platform> <disp> [activa|llena]`
    Add {
        email: String,
        key: String,
        platform: String,
        disp: i32,
    },
    /// `/del <email> <platform>`
    Delete { email: String, platform: String },
    /// `/editclave <email> <platform> <newKey>`
    EditKey {
        email: String,
        platform: String,
        key: String,
    },
    /// `/addp <email> [platform] [amount]`
    TakeSlots {
        email: String,
        platform: Option<String>,
        amount: i32,
    },
    /// `/delp <email> [platform] [amount]`
    ReleaseSlots {
        email: String,
        platform: Option<String>,
        amount: i32,
    },
    /// `/cliente <phone>`
    ShowCustomer { phone: String },
    /// `/delsub <phone> <platform> <email>`
    DeleteSubscription {
        phone: String,
        platform: String,
        email: String,
    },
    /// `/renovaciones [filter]`
    Renewals(RenewalFilter),
    /// `/txt ...`
    Txt(TxtTarget),
    /// `/clientes_txt`
    CustomersTxt,
    /// `/inventario [platform]`
    Inventory { platform: Option<String> },
    /// `/pagos [phone]`
    Payments { phone: Option<String> },
    /// `/nuevo`
    NewCustomer,
    /// `/cancelar`
    Cancel,
}

/// Which command a usage message belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Add,
    Delete,
    EditKey,
    TakeSlots,
    ReleaseSlots,
    ShowCustomer,
    DeleteSubscription,
    Renewals,
    Txt,
    Inventory,
    Payments,
}

impl CommandKind {
    /// Localization key of the usage text
    pub fn usage_key(&self) -> &'static str {
        match self {
            CommandKind::Add => "usage-add",
            CommandKind::Delete => "usage-del",
            CommandKind::EditKey => "usage-editclave",
            CommandKind::TakeSlots => "usage-addp",
            CommandKind::ReleaseSlots => "usage-delp",
            CommandKind::ShowCustomer => "usage-cliente",
            CommandKind::DeleteSubscription => "usage-delsub",
            CommandKind::Renewals => "usage-renovaciones",
            CommandKind::Txt => "usage-txt",
            CommandKind::Inventory => "usage-inventario",
            CommandKind::Payments => "usage-pagos",
        }
    }
}

/// Narrowing applied to the renewals listing
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RenewalFilter {
    /// Configured window, every platform
    #[default]
    Default,
    /// Custom window in days
    Days(i64),
    /// Configured window, one platform
    Platform(String),
}

impl RenewalFilter {
    fn parse(arg: Option<&str>) -> Result<Self, ParseError> {
        match arg {
            None => Ok(RenewalFilter::Default),
            Some(arg) => match arg.parse::<i64>() {
                Ok(days) if days >= 0 => Ok(RenewalFilter::Days(days)),
                Ok(_) => Err(ParseError::InvalidNumber(arg.to_string())),
                Err(_) => Ok(RenewalFilter::Platform(normalize_platform(arg))),
            },
        }
    }

    /// Window to use given the configured default
    pub fn window_days(&self, default_days: i64) -> i64 {
        match self {
            RenewalFilter::Days(days) => *days,
            _ => default_days,
        }
    }

    pub fn platform(&self) -> Option<&str> {
        match self {
            RenewalFilter::Platform(platform) => Some(platform),
            _ => None,
        }
    }
}

/// What `/txt` renders as plain text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxtTarget {
    Customer(String),
    Renewals(RenewalFilter),
    Inventory(Option<String>),
}

/// Reply-keyboard menu entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuItem {
    Inventario,
    Clientes,
    Pagos,
    Renovaciones,
    Buscar,
}

impl MenuItem {
    pub const ALL: [MenuItem; 5] = [
        MenuItem::Inventario,
        MenuItem::Clientes,
        MenuItem::Pagos,
        MenuItem::Renovaciones,
        MenuItem::Buscar,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MenuItem::Inventario => "Inventario",
            MenuItem::Clientes => "Clientes",
            MenuItem::Pagos => "Pagos",
            MenuItem::Renovaciones => "Renovaciones",
            MenuItem::Buscar => "Buscar",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        Self::ALL
            .into_iter()
            .find(|item| item.label().eq_ignore_ascii_case(text))
    }
}

/// Anything a text message can mean outside of a wizard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Command(Command),
    Menu(MenuItem),
    Text(String),
}

/// Errors that can occur while parsing a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Wrong argument count for a known command
    Usage(CommandKind),
    /// Keyword that is not a known command
    UnknownCommand(String),
    InvalidNumber(String),
    InvalidStatus(String),
    /// Explicit status contradicts the slot count
    StatusMismatch { disp: i32, status: SlotStatus },
    InvalidPhone(String),
    InvalidEmail(String),
    /// Value longer than an inline button payload can carry
    TooLong { value: String, max: usize },
}

impl ParseError {
    /// Text shown in the chat for this error
    pub fn user_message(&self) -> String {
        match self {
            ParseError::Usage(kind) => t(kind.usage_key()),
            ParseError::UnknownCommand(cmd) => t_args("error-unknown-command", &[("command", cmd)]),
            ParseError::InvalidNumber(value) => t_args("error-invalid-number", &[("value", value)]),
            ParseError::InvalidStatus(value) => t_args("error-invalid-status", &[("value", value)]),
            ParseError::StatusMismatch { disp, status } => t_args(
                "error-status-mismatch",
                &[("disp", &disp.to_string()), ("status", status.as_str())],
            ),
            ParseError::InvalidPhone(value) => t_args("error-invalid-phone", &[("value", value)]),
            ParseError::InvalidEmail(value) => t_args("error-invalid-email", &[("value", value)]),
            ParseError::TooLong { value, max } => {
                t_args("error-too-long", &[("value", value), ("max", &max.to_string())])
            }
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Usage(kind) => write!(f, "Wrong arguments for {:?}", kind),
            ParseError::UnknownCommand(cmd) => write!(f, "Unknown command: {}", cmd),
            ParseError::InvalidNumber(value) => write!(f, "Invalid number: {}", value),
            ParseError::InvalidStatus(value) => write!(f, "Invalid status: {}", value),
            ParseError::StatusMismatch { disp, status } => {
                write!(f, "Status {} contradicts disp {}", status, disp)
            }
            ParseError::InvalidPhone(value) => write!(f, "Invalid phone: {}", value),
            ParseError::InvalidEmail(value) => write!(f, "Invalid email: {}", value),
            ParseError::TooLong { value, max } => {
                write!(f, "Value longer than {} bytes: {}", max, value)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Parse a text message: a command, a menu label, or free text
pub fn parse_input(text: &str) -> Result<Input, ParseError> {
    let trimmed = text.trim();
    if trimmed.starts_with('/') {
        return parse_command(trimmed).map(Input::Command);
    }
    if let Some(item) = MenuItem::parse(trimmed) {
        return Ok(Input::Menu(item));
    }
    Ok(Input::Text(trimmed.to_string()))
}

/// Parse a `/command arg...` line
pub fn parse_command(text: &str) -> Result<Command, ParseError> {
    let mut tokens = text.split_whitespace();
    let head = tokens.next().unwrap_or_default();
    let keyword = head
        .split('@')
        .next()
        .unwrap_or_default()
        .to_lowercase();
    let args: Vec<&str> = tokens.collect();

    match keyword.as_str() {
        "/start" => Ok(Command::Start),
        "/help" | "/ayuda" => Ok(Command::Help),
        "/add" => parse_add(&args),
        "/del" => match args.as_slice() {
            [email, platform] => Ok(Command::Delete {
                email: normalize_email(email),
                platform: normalize_platform(platform),
            }),
            _ => Err(ParseError::Usage(CommandKind::Delete)),
        },
        "/editclave" => match args.as_slice() {
            [email, platform, key] => Ok(Command::EditKey {
                email: normalize_email(email),
                platform: normalize_platform(platform),
                key: key.to_string(),
            }),
            _ => Err(ParseError::Usage(CommandKind::EditKey)),
        },
        "/addp" => {
            let (email, platform, amount) = parse_slot_args(&args, CommandKind::TakeSlots)?;
            Ok(Command::TakeSlots {
                email,
                platform,
                amount,
            })
        }
        "/delp" => {
            let (email, platform, amount) = parse_slot_args(&args, CommandKind::ReleaseSlots)?;
            Ok(Command::ReleaseSlots {
                email,
                platform,
                amount,
            })
        }
        "/cliente" => match args.as_slice() {
            [phone] => Ok(Command::ShowCustomer {
                phone: parse_phone(phone)?,
            }),
            _ => Err(ParseError::Usage(CommandKind::ShowCustomer)),
        },
        "/delsub" => match args.as_slice() {
            [phone, platform, email] => Ok(Command::DeleteSubscription {
                phone: parse_phone(phone)?,
                platform: normalize_platform(platform),
                email: normalize_email(email),
            }),
            _ => Err(ParseError::Usage(CommandKind::DeleteSubscription)),
        },
        "/renovaciones" => match args.as_slice() {
            [] => Ok(Command::Renewals(RenewalFilter::Default)),
            [filter] => Ok(Command::Renewals(RenewalFilter::parse(Some(filter))?)),
            _ => Err(ParseError::Usage(CommandKind::Renewals)),
        },
        "/txt" => parse_txt(&args).map(Command::Txt),
        "/clientes_txt" => Ok(Command::CustomersTxt),
        "/inventario" => match args.as_slice() {
            [] => Ok(Command::Inventory { platform: None }),
            [platform] => Ok(Command::Inventory {
                platform: Some(normalize_platform(platform)),
            }),
            _ => Err(ParseError::Usage(CommandKind::Inventory)),
        },
        "/pagos" => match args.as_slice() {
            [] => Ok(Command::Payments { phone: None }),
            [phone] => Ok(Command::Payments {
                phone: Some(parse_phone(phone)?),
            }),
            _ => Err(ParseError::Usage(CommandKind::Payments)),
        },
        "/nuevo" => Ok(Command::NewCustomer),
        "/cancelar" | "/cancel" => Ok(Command::Cancel),
        _ => Err(ParseError::UnknownCommand(keyword)),
    }
}

fn parse_add(args: &[&str]) -> Result<Command, ParseError> {
    let (email, key, platform, disp, status) = match args {
        [email, key, platform, disp] => (email, key, platform, disp, None),
        [email, key, platform, disp, status] => (email, key, platform, disp, Some(status)),
        _ => return Err(ParseError::Usage(CommandKind::Add)),
    };

    let email = parse_email(email)?;
    let platform = normalize_platform(platform);
    if platform.len() > MAX_PLATFORM_BYTES {
        return Err(ParseError::TooLong {
            value: platform,
            max: MAX_PLATFORM_BYTES,
        });
    }
    let disp = parse_count(disp, 0)?;
    if let Some(token) = status {
        let status =
            SlotStatus::parse(token).ok_or_else(|| ParseError::InvalidStatus(token.to_string()))?;
        if status != SlotStatus::from_available(disp) {
            return Err(ParseError::StatusMismatch { disp, status });
        }
    }

    Ok(Command::Add {
        email,
        key: key.to_string(),
        platform,
        disp,
    })
}

/// `<email> [platform] [amount]`; a lone numeric second argument is the amount
fn parse_slot_args(
    args: &[&str],
    kind: CommandKind,
) -> Result<(String, Option<String>, i32), ParseError> {
    match args {
        [email] => Ok((normalize_email(email), None, 1)),
        [email, second] => match second.parse::<i64>() {
            Ok(_) => Ok((normalize_email(email), None, parse_count(second, 1)?)),
            Err(_) => Ok((normalize_email(email), Some(normalize_platform(second)), 1)),
        },
        [email, platform, amount] => Ok((
            normalize_email(email),
            Some(normalize_platform(platform)),
            parse_count(amount, 1)?,
        )),
        _ => Err(ParseError::Usage(kind)),
    }
}

fn parse_txt(args: &[&str]) -> Result<TxtTarget, ParseError> {
    let Some((first, rest)) = args.split_first() else {
        return Err(ParseError::Usage(CommandKind::Txt));
    };

    match first.to_lowercase().as_str() {
        "renovaciones" => match rest {
            [] => Ok(TxtTarget::Renewals(RenewalFilter::Default)),
            [filter] => Ok(TxtTarget::Renewals(RenewalFilter::parse(Some(filter))?)),
            _ => Err(ParseError::Usage(CommandKind::Txt)),
        },
        "inventario" => match rest {
            [] => Ok(TxtTarget::Inventory(None)),
            [platform] => Ok(TxtTarget::Inventory(Some(normalize_platform(platform)))),
            _ => Err(ParseError::Usage(CommandKind::Txt)),
        },
        _ if rest.is_empty() => Ok(TxtTarget::Customer(parse_phone(first)?)),
        _ => Err(ParseError::Usage(CommandKind::Txt)),
    }
}

/// Parse a non-negative count of at least `min`
fn parse_count(value: &str, min: i32) -> Result<i32, ParseError> {
    match value.parse::<i32>() {
        Ok(n) if n >= min => Ok(n),
        _ => Err(ParseError::InvalidNumber(value.to_string())),
    }
}

/// Normalize and validate a phone number (spaces, dashes and parentheses are dropped)
pub fn parse_phone(value: &str) -> Result<String, ParseError> {
    let cleaned: String = value
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect();
    if PHONE_PATTERN.is_match(&cleaned) {
        Ok(cleaned)
    } else {
        Err(ParseError::InvalidPhone(value.to_string()))
    }
}

pub fn parse_email(value: &str) -> Result<String, ParseError> {
    let email = normalize_email(value);
    if !EMAIL_PATTERN.is_match(&email) {
        return Err(ParseError::InvalidEmail(value.to_string()));
    }
    if email.len() > MAX_EMAIL_BYTES {
        return Err(ParseError::TooLong {
            value: email,
            max: MAX_EMAIL_BYTES,
        });
    }
    Ok(email)
}

/// Inline button payloads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// `RENOVÓ:<phone>:<platform>`
    Renew { phone: String, platform: String },
    /// `ELIMINAR:<phone>`
    DeleteCustomer { phone: String },
    /// `INV:<page>`
    InventoryPage(usize),
    /// `CLI:<page>`
    CustomersPage(usize),
    /// `WZP:<platform>`
    WizardPlatform(String),
    /// `WZE:<email>`
    WizardEmail(String),
    /// `WZDONE`
    WizardDone,
    /// Page indicator buttons
    Noop,
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        let (prefix, rest) = data.split_once(':').unwrap_or((data, ""));
        match prefix {
            RENEW_PREFIX => {
                let (phone, platform) = rest.split_once(':')?;
                if phone.is_empty() || platform.is_empty() {
                    return None;
                }
                Some(CallbackAction::Renew {
                    phone: phone.to_string(),
                    platform: platform.to_string(),
                })
            }
            DELETE_PREFIX if !rest.is_empty() => Some(CallbackAction::DeleteCustomer {
                phone: rest.to_string(),
            }),
            "INV" => rest.parse().ok().map(CallbackAction::InventoryPage),
            "CLI" => rest.parse().ok().map(CallbackAction::CustomersPage),
            "WZP" if !rest.is_empty() => Some(CallbackAction::WizardPlatform(rest.to_string())),
            "WZE" if !rest.is_empty() => Some(CallbackAction::WizardEmail(rest.to_string())),
            "WZDONE" => Some(CallbackAction::WizardDone),
            "NOOP" => Some(CallbackAction::Noop),
            _ => None,
        }
    }

    pub fn to_data(&self) -> String {
        match self {
            CallbackAction::Renew { phone, platform } => {
                format!("{}:{}:{}", RENEW_PREFIX, phone, platform)
            }
            CallbackAction::DeleteCustomer { phone } => format!("{}:{}", DELETE_PREFIX, phone),
            CallbackAction::InventoryPage(page) => format!("INV:{}", page),
            CallbackAction::CustomersPage(page) => format!("CLI:{}", page),
            CallbackAction::WizardPlatform(platform) => format!("WZP:{}", platform),
            CallbackAction::WizardEmail(email) => format!("WZE:{}", email),
            CallbackAction::WizardDone => "WZDONE".to_string(),
            CallbackAction::Noop => "NOOP".to_string(),
        }
    }
}
