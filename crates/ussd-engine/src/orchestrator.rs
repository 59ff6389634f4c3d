//! Flow orchestrator.
//!
//! Runs one gateway request end to end: tokenize, replay the walk, then
//! re-prompt, advance or perform the terminal action. Every path yields
//! a response; failures become terminal prompts.

use std::sync::Arc;

use chrono::{Duration, Local, NaiveDate, Utc};
use tracing::{debug, info, warn};

use ussd_core::config::UssdConfig;
use ussd_core::error::UssdError;
use ussd_core::types::{
    mask_phone, Field, GatewayRequest, GatewayResponse, Language, SessionEvent, SessionLogEntry,
};

use crate::context::SessionContext;
use crate::error::FlowError;
use crate::graph::{NavigationGraph, TerminalAction};
use crate::prompts::{Message, PromptCatalog};
use crate::services::{GeographyService, RegistrationService, SessionLog};
use crate::tokenizer::Tokenizer;
use crate::validation::{ValidationResult, Validator};
use crate::walk::{Walk, WalkState, Walker};

/// Terminal result of a request, before rendering.
struct Finish {
    text: String,
    outcome: &'static str,
    membership_number: Option<String>,
}

impl Finish {
    fn new(text: String, outcome: &'static str) -> Self {
        Self {
            text,
            outcome,
            membership_number: None,
        }
    }
}

/// Per-request driver shared by every gateway handler.
pub struct Orchestrator {
    config: UssdConfig,
    graph: NavigationGraph,
    tokenizer: Tokenizer,
    validator: Validator,
    prompts: PromptCatalog,
    registration: Arc<dyn RegistrationService>,
    geography: Arc<dyn GeographyService>,
    session_log: Option<Arc<dyn SessionLog>>,
}

impl Orchestrator {
    /// Build the graph and validators from `config`.
    pub fn new(
        config: UssdConfig,
        registration: Arc<dyn RegistrationService>,
        geography: Arc<dyn GeographyService>,
    ) -> Result<Self, UssdError> {
        config.check()?;
        let graph = NavigationGraph::standard(&config.session.languages)?;
        let validator = Validator::new(&config.validation)?;
        let prompts = PromptCatalog::new(config.party.clone(), config.gateway.service_code.clone())
            .with_max_chars(config.gateway.max_response_chars);

        Ok(Self {
            tokenizer: Tokenizer::new(config.gateway.delimiter.clone()),
            graph,
            validator,
            prompts,
            registration,
            geography,
            session_log: None,
            config,
        })
    }

    /// Record session summaries and enforce the per-phone session limit.
    pub fn with_session_log(mut self, log: Arc<dyn SessionLog>) -> Self {
        self.session_log = Some(log);
        self
    }

    pub fn config(&self) -> &UssdConfig {
        &self.config
    }

    pub fn graph(&self) -> &NavigationGraph {
        &self.graph
    }

    /// Handle a request using today's local date.
    pub async fn handle(&self, request: &GatewayRequest) -> GatewayResponse {
        self.handle_at(request, Local::now().date_naive()).await
    }

    /// Handle a request with an explicit date for age checks.
    pub async fn handle_at(&self, request: &GatewayRequest, today: NaiveDate) -> GatewayResponse {
        let tokens = self.tokenizer.tokenize(&request.text);

        if tokens.is_empty() {
            if let Some(text) = self.screen_new_session(request).await {
                return GatewayResponse::end(request, text);
            }
        }

        let walk = match self.replay(&request.text, today).await {
            Ok(walk) => walk,
            Err(err) => {
                warn!(
                    session_id = %request.session_id,
                    outcome = err.code(),
                    error = %err,
                    "Walk failed"
                );
                let language = self.config.session.default_language;
                let finish = Finish::new(self.failure_text(&err, language), err.code());
                self.record_finish(request, self.graph.root(), &finish).await;
                return GatewayResponse::end(request, finish.text);
            }
        };

        let ctx = &walk.ctx;
        match walk.state {
            WalkState::AwaitingInput => {
                let Some(node) = self.graph.node(ctx.node) else {
                    return GatewayResponse::end(
                        request,
                        self.prompts.render(Message::Unavailable, ctx.language, &[]),
                    );
                };
                debug!(
                    session_id = %request.session_id,
                    node = ctx.node,
                    attempts = ctx.attempts,
                    reason = ctx.rejection.as_ref().map(|r| r.reason.code()),
                    "Prompting"
                );
                GatewayResponse::prompt(request, self.prompts.node_prompt(node, ctx))
            }
            WalkState::TooManyAttempts => {
                let err = FlowError::TooManyAttempts {
                    node: ctx.node.to_string(),
                    attempts: ctx.attempts,
                };
                info!(session_id = %request.session_id, node = ctx.node, "Too many invalid attempts");
                let finish = Finish::new(self.failure_text(&err, ctx.language), err.code());
                self.record_finish(request, ctx.node, &finish).await;
                GatewayResponse::end(request, finish.text)
            }
            WalkState::Terminal(action) => {
                let finish = match action {
                    TerminalAction::Say(msg) => {
                        Finish::new(self.prompts.render(msg, ctx.language, &[]), "completed")
                    }
                    TerminalAction::SubmitRegistration => self.submit(request, ctx).await,
                    TerminalAction::LookupStatus => self.lookup(ctx).await,
                };
                info!(
                    session_id = %request.session_id,
                    node = ctx.node,
                    outcome = finish.outcome,
                    "Session finished"
                );
                self.record_finish(request, ctx.node, &finish).await;
                GatewayResponse::end(request, finish.text)
            }
        }
    }

    /// Replay `text` without side effects beyond geography lookups.
    pub async fn replay(&self, text: &str, today: NaiveDate) -> Result<Walk, FlowError> {
        let tokens = self.tokenizer.tokenize(text);
        let walker = Walker {
            graph: &self.graph,
            validator: &self.validator,
            geography: self.geography.as_ref(),
            max_attempts: self.config.session.max_invalid_attempts,
            max_menu_items: self.config.session.max_menu_items,
        };
        walker
            .walk(&tokens, self.config.session.default_language, today)
            .await
    }

    async fn submit(&self, request: &GatewayRequest, ctx: &SessionContext) -> Finish {
        let phone = match self.validator.phone(&request.phone_number) {
            ValidationResult::Accepted(phone) => phone,
            ValidationResult::Rejected(rejection) => {
                warn!(
                    session_id = %request.session_id,
                    phone = %mask_phone(&request.phone_number),
                    detail = %rejection.detail,
                    "Caller phone rejected"
                );
                return Finish::new(
                    self.prompts.render(Message::InvalidPhone, ctx.language, &[]),
                    "invalid-format",
                );
            }
        };

        let mut application = match ctx.to_new_member(&phone, &request.session_id) {
            Ok(app) => app,
            Err(err) => {
                let err = FlowError::from(err);
                return Finish::new(self.failure_text(&err, ctx.language), err.code());
            }
        };
        let operator = self.validator.operator(&phone);
        application.operator = operator.map(|op| op.as_str().to_string());
        debug!(
            session_id = %request.session_id,
            operator = operator.map(|op| op.as_str()).unwrap_or("unknown"),
            "Submitting registration"
        );

        match self.registration.register(&application).await {
            Ok(member) => {
                let text = self.prompts.render(
                    Message::Registered,
                    ctx.language,
                    &[
                        ("first_name", member.first_name.as_str()),
                        ("number", member.membership_number.as_str()),
                    ],
                );
                Finish {
                    text,
                    outcome: "registered",
                    membership_number: Some(member.membership_number),
                }
            }
            Err(err) => {
                let err = FlowError::from(err);
                warn!(session_id = %request.session_id, outcome = err.code(), error = %err, "Registration failed");
                Finish::new(self.failure_text(&err, ctx.language), err.code())
            }
        }
    }

    async fn lookup(&self, ctx: &SessionContext) -> Finish {
        let number = ctx.field(Field::MembershipNumber).unwrap_or_default();
        match self.registration.lookup(number).await {
            Ok(Some(member)) => Finish {
                text: self.prompts.member_status(&member, ctx.language),
                outcome: "status-found",
                membership_number: Some(member.membership_number),
            },
            Ok(None) => Finish::new(
                self.prompts
                    .render(Message::MemberNotFound, ctx.language, &[("number", number)]),
                "status-not-found",
            ),
            Err(err) => {
                let err = FlowError::from(err);
                warn!(outcome = err.code(), error = %err, "Status lookup failed");
                Finish::new(self.failure_text(&err, ctx.language), err.code())
            }
        }
    }

    fn failure_text(&self, err: &FlowError, language: Language) -> String {
        match err {
            FlowError::TooManyAttempts { .. } => {
                self.prompts.render(Message::TooManyAttempts, language, &[])
            }
            FlowError::UpstreamUnavailable(_) => {
                self.prompts.render(Message::Unavailable, language, &[])
            }
            FlowError::DuplicateRegistration { membership_number } => self.prompts.render(
                Message::AlreadyRegistered,
                language,
                &[("number", membership_number.as_str())],
            ),
            FlowError::InvalidChoice { .. } | FlowError::InvalidFormat { .. } => {
                self.prompts.render(Message::ApplicationRejected, language, &[])
            }
        }
    }

    /// Log the fresh dial, or return the refusal text when the caller has
    /// opened too many sessions inside the abuse window.
    async fn screen_new_session(&self, request: &GatewayRequest) -> Option<String> {
        let log = self.session_log.as_ref()?;
        let phone = self.caller_key(request);
        let limits = &self.config.limits;

        if limits.max_sessions_per_phone > 0 {
            let since = Utc::now() - Duration::seconds(limits.abuse_window_secs as i64);
            match log.sessions_started_since(&phone, since).await {
                Ok(n) if n >= limits.max_sessions_per_phone => {
                    warn!(
                        session_id = %request.session_id,
                        phone = %mask_phone(&phone),
                        sessions = n,
                        "Session limit reached"
                    );
                    self.record(log.as_ref(), request, SessionEvent::Refused, self.graph.root(), "refused", None)
                        .await;
                    return Some(self.prompts.render(
                        Message::Refused,
                        self.config.session.default_language,
                        &[],
                    ));
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Session limit check failed"),
            }
        }

        self.record(log.as_ref(), request, SessionEvent::Started, self.graph.root(), "started", None)
            .await;
        None
    }

    async fn record_finish(&self, request: &GatewayRequest, node: &str, finish: &Finish) {
        if let Some(log) = &self.session_log {
            self.record(
                log.as_ref(),
                request,
                SessionEvent::Finished,
                node,
                finish.outcome,
                finish.membership_number.clone(),
            )
            .await;
        }
    }

    async fn record(
        &self,
        log: &dyn SessionLog,
        request: &GatewayRequest,
        event: SessionEvent,
        node: &str,
        outcome: &str,
        membership_number: Option<String>,
    ) {
        let entry = SessionLogEntry {
            session_id: request.session_id.clone(),
            phone_number: self.caller_key(request),
            event,
            node: node.to_string(),
            outcome: outcome.to_string(),
            membership_number,
            at: Utc::now(),
        };
        if let Err(e) = log.record(&entry).await {
            warn!(session_id = %request.session_id, error = %e, "Failed to append session log");
        }
    }

    /// Normalised caller phone when valid, the raw value otherwise.
    fn caller_key(&self, request: &GatewayRequest) -> String {
        match self.validator.phone(&request.phone_number) {
            ValidationResult::Accepted(phone) => phone,
            ValidationResult::Rejected(_) => request.phone_number.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::services::{SqliteGeography, SqliteRegistry, SqliteSessionLog};
    use async_trait::async_trait;
    use ussd_core::types::{GeoLevel, GeoUnit, MemberRecord, NewMember};
    use ussd_storage::{Database, MemberRepository};

    struct Offline;

    #[async_trait]
    impl RegistrationService for Offline {
        async fn register(&self, _: &NewMember) -> Result<MemberRecord, ServiceError> {
            Err(ServiceError::Unavailable("connection refused".to_string()))
        }

        async fn lookup(&self, _: &str) -> Result<Option<MemberRecord>, ServiceError> {
            Err(ServiceError::Unavailable("connection refused".to_string()))
        }
    }

    #[async_trait]
    impl GeographyService for Offline {
        async fn children(
            &self,
            _: GeoLevel,
            _: Option<i64>,
        ) -> Result<Vec<GeoUnit>, ServiceError> {
            Err(ServiceError::Unavailable("connection refused".to_string()))
        }
    }

    struct Harness {
        db: Arc<Database>,
        orchestrator: Orchestrator,
    }

    fn harness_with(config: UssdConfig) -> Harness {
        let db = Arc::new(Database::in_memory().unwrap());
        let orchestrator = Orchestrator::new(
            config,
            Arc::new(SqliteRegistry::new(Arc::clone(&db), "PM")),
            Arc::new(SqliteGeography::new(Arc::clone(&db))),
        )
        .unwrap()
        .with_session_log(Arc::new(SqliteSessionLog::new(Arc::clone(&db))));
        Harness { db, orchestrator }
    }

    fn harness() -> Harness {
        harness_with(UssdConfig::default())
    }

    fn request(session: &str, text: &str) -> GatewayRequest {
        GatewayRequest {
            session_id: session.to_string(),
            phone_number: "0971234567".to_string(),
            text: text.to_string(),
            service_code: Some("*388*3#".to_string()),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    const FULL: &str = "1*1*Dennis*Kazembe*123456/78/1*01/01/1990*1";

    #[tokio::test]
    async fn test_fresh_dial_shows_root_menu() {
        let h = harness();
        let resp = h.orchestrator.handle_at(&request("s-1", ""), today()).await;
        assert!(resp.continue_session);
        assert_eq!(resp.text, "Welcome to ADD\n1. Register\n2. Check Status\n0. Exit");
        assert_eq!(resp.session_id, "s-1");
    }

    #[tokio::test]
    async fn test_register_shows_language_menu() {
        let h = harness();
        let resp = h.orchestrator.handle_at(&request("s-1", "1"), today()).await;
        assert!(resp.continue_session);
        assert_eq!(
            resp.text,
            "Select language:\n1. English\n2. Ichibemba\n3. Chinyanja"
        );
    }

    #[tokio::test]
    async fn test_language_choice_asks_for_first_name() {
        let h = harness();
        let resp = h.orchestrator.handle_at(&request("s-1", "1*1"), today()).await;
        assert!(resp.continue_session);
        assert_eq!(resp.text, "Enter your first name:");
    }

    #[tokio::test]
    async fn test_confirmation_summarises_fields() {
        let h = harness();
        let resp = h
            .orchestrator
            .handle_at(&request("s-1", "1*1*dennis*kazembe*123456/78/1*01/01/1990"), today())
            .await;
        assert!(resp.continue_session);
        assert!(resp.text.starts_with("Confirm Registration:\nDennis Kazembe\nNRC: 123456/78/1\nDOB: 01/01/1990"));
        assert!(resp.text.ends_with("1. Confirm\n2. Add home location\n0. Cancel"));
    }

    #[tokio::test]
    async fn test_confirmation_with_long_names_keeps_every_choice() {
        let h = harness();
        let text = format!(
            "1*1*{}*{}*123456/78/1*01/01/1990",
            "a".repeat(40),
            "b".repeat(40)
        );
        let resp = h.orchestrator.handle_at(&request("s-1", &text), today()).await;
        assert!(resp.continue_session);
        assert!(resp.text.chars().count() <= 160, "{} chars", resp.text.chars().count());
        assert!(resp.text.starts_with("Confirm Registration:\nAaaa"));
        assert!(resp.text.contains("NRC: 123456/78/1\nDOB: 01/01/1990"));
        assert!(resp.text.ends_with("1. Confirm\n2. Add home location\n0. Cancel"));
    }

    #[tokio::test]
    async fn test_confirmation_shows_braces_in_names_verbatim() {
        let h = harness();
        let resp = h
            .orchestrator
            .handle_at(&request("s-1", "1*1*{dob}*Kazembe*123456/78/1*01/01/1990"), today())
            .await;
        assert!(resp
            .text
            .starts_with("Confirm Registration:\n{dob} Kazembe\nNRC: 123456/78/1\nDOB: 01/01/1990"));
    }

    #[tokio::test]
    async fn test_bemba_prompts_after_language_choice() {
        let h = harness();
        let resp = h.orchestrator.handle_at(&request("s-1", "1*2"), today()).await;
        assert_eq!(resp.text, "Lembeni ishina lyenu lya kubalilapo:");

        let resp = h
            .orchestrator
            .handle_at(&request("s-1", "1*2*Dennis*Kazembe*123456/78/1*01/01/1990"), today())
            .await;
        assert!(resp.text.starts_with("Sumineni ukulembesha:\nDennis Kazembe"));
        assert!(resp.text.ends_with("1. Sumina\n2. Lundeni uko mwikala\n0. Leka"));

        let resp = h
            .orchestrator
            .handle_at(&request("s-2", "1*3*Dennis*Kazembe*123456/78/1*01/01/1990*0"), today())
            .await;
        assert!(!resp.continue_session);
        assert_eq!(resp.text, "Kulembetsa kwaletsedwa.\nZikomo!");
    }

    #[tokio::test]
    async fn test_full_registration_ends_with_membership_number() {
        let h = harness();
        let resp = h.orchestrator.handle_at(&request("s-1", FULL), today()).await;
        assert!(!resp.continue_session);
        assert!(resp.text.contains("Member ID: PM"), "text {}", resp.text);

        let members = MemberRepository::new(Arc::clone(&h.db));
        let stored = members.find_by_national_id("123456/78/1").unwrap().unwrap();
        assert_eq!(stored.phone_number, "260971234567");
        assert_eq!(stored.operator.as_deref(), Some("airtel"));
        assert!(resp.text.contains(&stored.membership_number));
    }

    #[tokio::test]
    async fn test_double_submit_returns_same_number() {
        let h = harness();
        let first = h.orchestrator.handle_at(&request("s-1", FULL), today()).await;
        let second = h.orchestrator.handle_at(&request("s-1", FULL), today()).await;
        assert_eq!(first.text, second.text);
        assert_eq!(MemberRepository::new(Arc::clone(&h.db)).count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_from_other_session() {
        let h = harness();
        h.orchestrator.handle_at(&request("s-1", FULL), today()).await;
        let resp = h.orchestrator.handle_at(&request("s-2", FULL), today()).await;
        assert!(!resp.continue_session);
        assert!(resp.text.starts_with("This NRC is already registered."));
    }

    #[tokio::test]
    async fn test_bemba_registration_message() {
        let h = harness();
        let resp = h
            .orchestrator
            .handle_at(&request("s-1", "1*2*Dennis*Kazembe*123456/78/1*01/01/1990*1"), today())
            .await;
        assert!(resp.text.starts_with("Mwaiseni Dennis mu chipani!"));
    }

    #[tokio::test]
    async fn test_malformed_national_id_reprompts_with_annotation() {
        let h = harness();
        let text = "1*1*Dennis*Kazembe*1234567";
        let resp = h.orchestrator.handle_at(&request("s-1", text), today()).await;
        assert!(resp.continue_session);
        assert_eq!(
            resp.text,
            "Invalid input. Try again.\nEnter your NRC number (e.g. 123456/78/1):"
        );

        let walk = h.orchestrator.replay(text, today()).await.unwrap();
        assert_eq!(walk.ctx.attempts, 1);
    }

    #[tokio::test]
    async fn test_too_many_attempts_terminates() {
        let h = harness();
        let resp = h
            .orchestrator
            .handle_at(&request("s-1", "1*1*Dennis*Kazembe*a*b*c"), today())
            .await;
        assert!(resp.continue_session);

        let resp = h
            .orchestrator
            .handle_at(&request("s-1", "1*1*Dennis*Kazembe*a*b*c*123456/78/1"), today())
            .await;
        assert!(!resp.continue_session);
        assert!(resp.text.starts_with("Too many invalid attempts."));
    }

    #[tokio::test]
    async fn test_exit_and_cancel() {
        let h = harness();
        let resp = h.orchestrator.handle_at(&request("s-1", "0"), today()).await;
        assert!(!resp.continue_session);
        assert_eq!(resp.text, "Thank you for using ADD.");

        let resp = h
            .orchestrator
            .handle_at(&request("s-2", "1*1*Dennis*Kazembe*123456/78/1*01/01/1990*0"), today())
            .await;
        assert!(!resp.continue_session);
        assert!(resp.text.starts_with("Registration cancelled."));
    }

    #[tokio::test]
    async fn test_registration_with_location_then_status() {
        let h = harness();
        // Lusaka -> Lusaka -> Kabwata -> Kamwala
        let walk = h
            .orchestrator
            .replay("1*1*Dennis*Kazembe*123456/78/1*01/01/1990*2*5", today())
            .await
            .unwrap();
        let district = walk.ctx.options.iter().position(|d| d.name == "Lusaka").unwrap() + 1;
        let base = format!("1*1*Dennis*Kazembe*123456/78/1*01/01/1990*2*5*{}", district);
        let walk = h.orchestrator.replay(&base, today()).await.unwrap();
        let constituency = walk.ctx.options.iter().position(|c| c.name == "Kabwata").unwrap() + 1;
        let base = format!("{}*{}", base, constituency);
        let walk = h.orchestrator.replay(&base, today()).await.unwrap();
        let ward = walk.ctx.options.iter().position(|w| w.name == "Kamwala").unwrap() + 1;
        let base = format!("{}*{}", base, ward);

        let confirm = h.orchestrator.handle_at(&request("s-1", &base), today()).await;
        assert!(confirm.continue_session);
        assert!(confirm.text.contains("Kamwala, Kabwata"));

        let done = h
            .orchestrator
            .handle_at(&request("s-1", &format!("{}*1", base)), today())
            .await;
        assert!(!done.continue_session);

        let members = MemberRepository::new(Arc::clone(&h.db));
        let member = members.find_by_national_id("123456/78/1").unwrap().unwrap();
        assert_eq!(member.ward.as_deref(), Some("Kamwala"));

        let status = h
            .orchestrator
            .handle_at(
                &request("s-2", &format!("2*{}", member.membership_number.to_lowercase())),
                today(),
            )
            .await;
        assert!(!status.continue_session);
        assert!(status.text.starts_with("Member Details\nDennis Kazembe"));
        assert!(status.text.contains("Kamwala, Kabwata"));
        assert!(status.text.contains("Pay K25"));
    }

    #[tokio::test]
    async fn test_unknown_membership_number() {
        let h = harness();
        let resp = h.orchestrator.handle_at(&request("s-1", "2*PM99999999"), today()).await;
        assert!(!resp.continue_session);
        assert_eq!(resp.text, "Membership number PM99999999 was not found.");
    }

    #[tokio::test]
    async fn test_invalid_caller_phone_blocks_registration() {
        let h = harness();
        let mut req = request("s-1", FULL);
        req.phone_number = "12345".to_string();
        let resp = h.orchestrator.handle_at(&req, today()).await;
        assert!(!resp.continue_session);
        assert_eq!(resp.text, "This phone number cannot be used to register.");
        assert_eq!(MemberRepository::new(Arc::clone(&h.db)).count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_terminal_prompt() {
        let orchestrator = Orchestrator::new(
            UssdConfig::default(),
            Arc::new(Offline),
            Arc::new(Offline),
        )
        .unwrap();

        let resp = orchestrator.handle_at(&request("s-1", FULL), today()).await;
        assert!(!resp.continue_session);
        assert_eq!(
            resp.text,
            "Service temporarily unavailable. Please try again later."
        );

        // Entering the province list needs the geography service.
        let resp = orchestrator
            .handle_at(&request("s-1", "1*1*Dennis*Kazembe*123456/78/1*01/01/1990*2"), today())
            .await;
        assert!(!resp.continue_session);
        assert!(resp.text.starts_with("Service temporarily unavailable"));
    }

    #[tokio::test]
    async fn test_session_limit_refuses_fresh_dials() {
        let mut config = UssdConfig::default();
        config.limits.max_sessions_per_phone = 2;
        let h = harness_with(config);

        for session in ["a", "b"] {
            let resp = h.orchestrator.handle_at(&request(session, ""), today()).await;
            assert!(resp.continue_session);
        }
        let resp = h.orchestrator.handle_at(&request("c", ""), today()).await;
        assert!(!resp.continue_session);
        assert!(resp.text.starts_with("Too many sessions"));

        // Sessions already in progress are not affected.
        let resp = h.orchestrator.handle_at(&request("a", "1"), today()).await;
        assert!(resp.continue_session);
    }

    #[tokio::test]
    async fn test_session_log_records_outcome() {
        let h = harness();
        h.orchestrator.handle_at(&request("s-1", ""), today()).await;
        h.orchestrator.handle_at(&request("s-1", FULL), today()).await;

        let entries = ussd_storage::SessionLogRepository::new(Arc::clone(&h.db))
            .for_session("s-1")
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event, SessionEvent::Started);
        assert_eq!(entries[1].event, SessionEvent::Finished);
        assert_eq!(entries[1].outcome, "registered");
        assert_eq!(entries[1].node, "reg_submit");
        assert!(entries[1].membership_number.is_some());
        assert_eq!(entries[1].phone_number, "260971234567");
    }

    #[tokio::test]
    async fn test_custom_delimiter_and_threshold() {
        let mut config = UssdConfig::default();
        config.gateway.delimiter = "#".to_string();
        config.session.max_invalid_attempts = 1;
        let h = harness_with(config);

        let resp = h.orchestrator.handle_at(&request("s-1", "1#1"), today()).await;
        assert_eq!(resp.text, "Enter your first name:");

        let resp = h.orchestrator.handle_at(&request("s-1", "9#9"), today()).await;
        assert!(!resp.continue_session);
    }
}
