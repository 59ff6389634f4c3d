//! Prompt catalog.
//!
//! English is complete. Bemba and Nyanja cover everything shown after
//! the caller picks a language; anything else falls back to English.

use ussd_core::config::PartyConfig;
use ussd_core::types::{Language, MemberRecord, MembershipStatus};

use crate::context::SessionContext;
use crate::graph::{Label, MenuNode, NodeKind};
use crate::validation::RejectReason;

/// Catalog entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Message {
    // Node headers
    MainMenu,
    LanguageMenu,
    FirstName,
    LastName,
    NationalId,
    DateOfBirth,
    ConfirmRegistration,
    SelectProvince,
    SelectDistrict,
    SelectConstituency,
    SelectWard,
    ConfirmLocation,
    MembershipNumber,
    // Choice labels
    Register,
    CheckStatus,
    Exit,
    Confirm,
    AddLocation,
    Cancel,
    Skip,
    // Annotations
    InvalidChoice,
    InvalidFormat,
    // Terminal messages
    Goodbye,
    Cancelled,
    Registered,
    MemberStatus,
    FeeReminder,
    MemberNotFound,
    AlreadyRegistered,
    InvalidPhone,
    ApplicationRejected,
    TooManyAttempts,
    Unavailable,
    Refused,
}

fn english(msg: Message) -> &'static str {
    match msg {
        Message::MainMenu => "Welcome to {party}",
        Message::LanguageMenu => "Select language:",
        Message::FirstName => "Enter your first name:",
        Message::LastName => "Enter your last name:",
        Message::NationalId => "Enter your NRC number (e.g. 123456/78/1):",
        Message::DateOfBirth => "Enter your date of birth (DD/MM/YYYY):",
        Message::ConfirmRegistration => "Confirm Registration:\n{name}\nNRC: {national_id}\nDOB: {dob}",
        Message::SelectProvince => "Select Province:",
        Message::SelectDistrict => "Select District:",
        Message::SelectConstituency => "Select Constituency:",
        Message::SelectWard => "Select Ward:",
        Message::ConfirmLocation => "Confirm Registration:\n{name}\nNRC: {national_id}\n{location}",
        Message::MembershipNumber => "Enter your membership number:",
        Message::Register => "Register",
        Message::CheckStatus => "Check Status",
        Message::Exit => "Exit",
        Message::Confirm => "Confirm",
        Message::AddLocation => "Add home location",
        Message::Cancel => "Cancel",
        Message::Skip => "Skip",
        Message::InvalidChoice => "Invalid choice. Try again.",
        Message::InvalidFormat => "Invalid input. Try again.",
        Message::Goodbye => "Thank you for using {party}.",
        Message::Cancelled => "Registration cancelled.\nThank you!",
        Message::Registered => {
            "Welcome to {party}, {first_name}!\nMember ID: {number}\nPay {fee} to activate your membership."
        }
        Message::MemberStatus => "Member Details\n{name}\nNo: {number}\nStatus: {status}",
        Message::FeeReminder => "Pay {fee} to activate.",
        Message::MemberNotFound => "Membership number {number} was not found.",
        Message::AlreadyRegistered => "This NRC is already registered.\nMember ID: {number}",
        Message::InvalidPhone => "This phone number cannot be used to register.",
        Message::ApplicationRejected => "Your details could not be accepted. Please dial {code} again.",
        Message::TooManyAttempts => "Too many invalid attempts. Please dial {code} again.",
        Message::Unavailable => "Service temporarily unavailable. Please try again later.",
        Message::Refused => "Too many sessions from this number. Please try again later.",
    }
}

fn translated(msg: Message, language: Language) -> Option<&'static str> {
    match language {
        Language::English => None,
        Language::Bemba => bemba(msg),
        Language::Nyanja => nyanja(msg),
    }
}

fn bemba(msg: Message) -> Option<&'static str> {
    let text = match msg {
        Message::FirstName => "Lembeni ishina lyenu lya kubalilapo:",
        Message::LastName => "Lembeni ishina lyenu lya lupwa:",
        Message::NationalId => "Lembeni inambala ya NRC (e.g. 123456/78/1):",
        Message::DateOfBirth => "Lembeni ubushiku mwafyelwe (DD/MM/YYYY):",
        Message::ConfirmRegistration => "Sumineni ukulembesha:\n{name}\nNRC: {national_id}\nDOB: {dob}",
        Message::SelectProvince => "Saleni Province:",
        Message::SelectDistrict => "Saleni District:",
        Message::SelectConstituency => "Saleni Constituency:",
        Message::SelectWard => "Saleni Ward:",
        Message::ConfirmLocation => "Sumineni ukulembesha:\n{name}\nNRC: {national_id}\n{location}",
        Message::Register => "Lembelesha",
        Message::CheckStatus => "Fwaya umulandu",
        Message::Exit => "Fulila",
        Message::Confirm => "Sumina",
        Message::AddLocation => "Lundeni uko mwikala",
        Message::Cancel => "Leka",
        Message::Skip => "Pita",
        Message::InvalidChoice => "Ichi musalile tachilungeme. Esheni na kabili.",
        Message::InvalidFormat => "Ifyo mwalembele tafilungeme. Esheni na kabili.",
        Message::Cancelled => "Ukulembesha kwaleka.\nTwatotela!",
        Message::Registered => {
            "Mwaiseni {first_name} mu chipani! Inambala yenu ya membership ni {number}"
        }
        Message::AlreadyRegistered => "Iyi NRC yalilembwa kale.\nMember ID: {number}",
        Message::ApplicationRejected => "Tatwapokelele ifyo mwalembele. Imbeni {code} na kabili.",
        Message::TooManyAttempts => "Mwalufyanya imiku iingi. Imbeni {code} na kabili.",
        _ => return None,
    };
    Some(text)
}

fn nyanja(msg: Message) -> Option<&'static str> {
    let text = match msg {
        Message::FirstName => "Lembani dzina lanu loyamba:",
        Message::LastName => "Lembani dzina lanu la banja:",
        Message::NationalId => "Lembani nambala ya NRC (e.g. 123456/78/1):",
        Message::DateOfBirth => "Lembani tsiku lobadwa (DD/MM/YYYY):",
        Message::ConfirmRegistration => "Tsimikizani kulembetsa:\n{name}\nNRC: {national_id}\nDOB: {dob}",
        Message::SelectProvince => "Sankhani Province:",
        Message::SelectDistrict => "Sankhani District:",
        Message::SelectConstituency => "Sankhani Constituency:",
        Message::SelectWard => "Sankhani Ward:",
        Message::ConfirmLocation => "Tsimikizani kulembetsa:\n{name}\nNRC: {national_id}\n{location}",
        Message::Register => "Lembetsa",
        Message::CheckStatus => "Ona momwe zilili",
        Message::Exit => "Tuluka",
        Message::Confirm => "Tsimikizani",
        Message::AddLocation => "Onjezani kumene mumakhala",
        Message::Cancel => "Letsani",
        Message::Skip => "Dumphani",
        Message::InvalidChoice => "Chisankho sichili bwino. Yesaninso.",
        Message::InvalidFormat => "Zomwe mwalemba sizili bwino. Yesaninso.",
        Message::Cancelled => "Kulembetsa kwaletsedwa.\nZikomo!",
        Message::Registered => {
            "Takulandilani {first_name} ku chipani! Nambala yanu ya membership ndi {number}"
        }
        Message::AlreadyRegistered => "NRC iyi inalembetsedwa kale.\nMember ID: {number}",
        Message::ApplicationRejected => "Zomwe mwalemba sizinalandiridwe. Imbani {code} kachiwiri.",
        Message::TooManyAttempts => "Mwalakwitsa kambiri. Imbani {code} kachiwiri.",
        _ => return None,
    };
    Some(text)
}

/// Shortest a header line is cut down to, ellipsis included.
const MIN_HEADER_LINE: usize = 8;

fn char_len(lines: &[String]) -> usize {
    lines.iter().map(|l| l.chars().count()).sum::<usize>() + lines.len().saturating_sub(1)
}

/// Cut the longest lines of `header` with `...` until it fits `budget`.
fn fit_header(header: &str, budget: usize) -> String {
    let mut lines: Vec<String> = header.lines().map(str::to_string).collect();
    while char_len(&lines) > budget {
        let Some((idx, longest)) = lines
            .iter()
            .map(|l| l.chars().count())
            .enumerate()
            .max_by_key(|(_, n)| *n)
        else {
            break;
        };
        if longest <= MIN_HEADER_LINE {
            break;
        }
        let excess = char_len(&lines) - budget;
        let keep = longest
            .saturating_sub(excess + 3)
            .max(MIN_HEADER_LINE - 3);
        let head: String = lines[idx].chars().take(keep).collect();
        lines[idx] = format!("{}...", head.trim_end());
    }
    lines.join("\n")
}

/// Renders catalog entries with party and session values filled in.
#[derive(Debug, Clone)]
pub struct PromptCatalog {
    party: PartyConfig,
    service_code: String,
    /// Upper bound for node prompts; 0 leaves them unbounded.
    max_chars: usize,
}

impl PromptCatalog {
    pub fn new(party: PartyConfig, service_code: impl Into<String>) -> Self {
        Self {
            party,
            service_code: service_code.into(),
            max_chars: 0,
        }
    }

    /// Bound node prompts to `max_chars`. Choice lines are always kept;
    /// the header is shortened instead.
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    /// Raw template for `msg` in `language`, English when untranslated.
    pub fn template(&self, msg: Message, language: Language) -> &'static str {
        translated(msg, language).unwrap_or_else(|| english(msg))
    }

    /// Render `msg`, substituting `{party}`, `{fee}`, `{code}` and `vars`.
    ///
    /// Placeholders are resolved in one pass over the template; inserted
    /// values are never scanned again. Unknown placeholders stay as typed.
    pub fn render(&self, msg: Message, language: Language, vars: &[(&str, &str)]) -> String {
        let template = self.template(msg, language);
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                out.push_str(&rest[open..]);
                rest = "";
                break;
            };
            let key = &after[..close];
            let value = match key {
                "party" => Some(self.party.name.as_str()),
                "fee" => Some(self.party.membership_fee.as_str()),
                "code" => Some(self.service_code.as_str()),
                _ => vars.iter().find(|(k, _)| *k == key).map(|(_, v)| *v),
            };
            match value {
                Some(value) => out.push_str(value),
                None => out.push_str(&rest[open..open + close + 2]),
            }
            rest = &after[close + 1..];
        }
        out.push_str(rest);
        out
    }

    /// Prompt for the node the walk stopped at, with an error annotation
    /// when the last token was rejected.
    pub fn node_prompt(&self, node: &MenuNode, ctx: &SessionContext) -> String {
        let lang = ctx.language;
        let name = ctx.full_name();
        let dob = ctx.date_of_birth_display();
        let location = ctx.location_label().unwrap_or_default();
        let vars = [
            ("name", name.as_str()),
            ("national_id", ctx.field(ussd_core::types::Field::NationalId).unwrap_or("")),
            ("dob", dob.as_str()),
            ("location", location.as_str()),
        ];

        let annotation = ctx.rejection.as_ref().map(|rejection| {
            let msg = match rejection.reason {
                RejectReason::InvalidChoice => Message::InvalidChoice,
                RejectReason::InvalidFormat => Message::InvalidFormat,
            };
            self.render(msg, lang, &[])
        });
        let header = self.render(node.prompt, lang, &vars);

        let mut options = Vec::new();
        match &node.kind {
            NodeKind::FixedChoice { choices, .. } => {
                for choice in choices {
                    let label = match &choice.label {
                        Label::Message(msg) => self.render(*msg, lang, &[]),
                        Label::Text(text) => text.clone(),
                    };
                    options.push(format!("{}. {}", choice.key, label));
                }
            }
            NodeKind::Geography { .. } => {
                if ctx.options.is_empty() {
                    options.push(format!("0. {}", self.render(Message::Skip, lang, &[])));
                } else {
                    for (i, unit) in ctx.options.iter().enumerate() {
                        options.push(format!("{}. {}", i + 1, unit.name));
                    }
                }
            }
            NodeKind::FreeText { .. } | NodeKind::Terminal(_) => {}
        }

        let header = if self.max_chars == 0 {
            header
        } else {
            // Each line after the header costs its length plus a newline.
            let reserved = annotation
                .iter()
                .chain(options.iter())
                .map(|line| line.chars().count() + 1)
                .sum::<usize>();
            fit_header(&header, self.max_chars.saturating_sub(reserved))
        };

        let mut lines: Vec<String> = annotation.into_iter().collect();
        lines.push(header);
        lines.extend(options);
        lines.join("\n")
    }

    /// Status screen for a looked-up member.
    pub fn member_status(&self, member: &MemberRecord, language: Language) -> String {
        let name = member.full_name();
        let status = member.status.to_string();
        let mut text = self.render(
            Message::MemberStatus,
            language,
            &[
                ("name", name.as_str()),
                ("number", member.membership_number.as_str()),
                ("status", status.as_str()),
            ],
        );
        if let Some(location) = member.location_label() {
            text.push('\n');
            text.push_str(&location);
        }
        if member.status == MembershipStatus::Pending {
            text.push('\n');
            text.push_str(&self.render(Message::FeeReminder, language, &[]));
        }
        text
    }
}
