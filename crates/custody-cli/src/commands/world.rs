//! Builds one in-process `CustodyService` wired entirely from in-memory
//! fakes instead of reaching out to real services. Every scenario in
//! `demo.rs` gets a fresh world so scenarios never interfere with each
//! other.

use std::sync::Arc;

use custody_auth::{ApproverAuthenticator, TotpService};
use custody_core::{CustodyConfig, CustodyService, LoggingNotificationSink, NotificationSink};
use custody_crypto::hsm::{FakeHsm, HsmGateway, ReleaseAuthenticator};
use custody_db::{CustodyStore, InMemoryStore};
use custody_ledger::{FakeLedgerClient, LedgerClient};
use custody_types::{ApproverId, ApproverRole, Clock, TestClock};

/// One enrolled demo approver: its fixed role, its id, and its raw TOTP
/// secret so the CLI can mint valid codes on its behalf without a real
/// authenticator app.
pub struct DemoApprover {
    pub role: ApproverRole,
    pub id: ApproverId,
    pub secret: String,
}

pub struct DemoWorld {
    pub service: CustodyService,
    pub clock: Arc<TestClock>,
    pub ledger: Arc<FakeLedgerClient>,
    pub totp: TotpService,
    pub approvers: Vec<DemoApprover>,
}

impl DemoWorld {
    /// The one-time code `approver` would read off its authenticator app
    /// right now.
    pub fn code_for(&self, approver: ApproverId) -> String {
        let secret = &self.approvers.iter().find(|a| a.id == approver).expect("unknown demo approver").secret;
        self.totp.generate_current_code(secret, self.clock.now_millis()).expect("demo secret is well-formed")
    }

    pub fn approver(&self, role: ApproverRole) -> ApproverId {
        self.approvers.iter().find(|a| a.role == role).expect("every role is enrolled in the demo world").id
    }
}

pub async fn build() -> DemoWorld {
    let clock = Arc::new(TestClock::new(1_700_000_000_000));
    let store: Arc<dyn CustodyStore> = Arc::new(InMemoryStore::new());
    let config = CustodyConfig::default();

    let authenticator =
        Arc::new(ApproverAuthenticator::new(store.clone(), clock.clone() as Arc<dyn Clock>, config.auth.clone()));
    let release_authenticator: Arc<dyn ReleaseAuthenticator> = authenticator.clone();
    let hsm: Arc<dyn HsmGateway> = Arc::new(FakeHsm::new(clock.clone() as Arc<dyn Clock>, release_authenticator, 300_000));
    let ledger = Arc::new(FakeLedgerClient::new(100));
    let ledger_client: Arc<dyn LedgerClient> = ledger.clone();
    let notifier: Arc<dyn NotificationSink> = Arc::new(LoggingNotificationSink);
    let totp = TotpService::new(config.auth.totp.clone());

    let service = CustodyService::new(
        store,
        clock.clone() as Arc<dyn Clock>,
        hsm,
        authenticator,
        ledger_client,
        notifier,
        config,
    );

    let mut approvers = Vec::new();
    for (role, name) in [(ApproverRole::Ceo, "ceo"), (ApproverRole::Cfo, "cfo"), (ApproverRole::Cto, "cto")] {
        let id = ApproverId::new();
        let secret = service
            .enroll_approver(role, id, name, format!("{name}@example.com"))
            .await
            .expect("demo enrollment never fails");
        approvers.push(DemoApprover { role, id, secret: secret.secret });
    }

    DemoWorld { service, clock, ledger, totp, approvers }
}
