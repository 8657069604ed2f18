//! The six end-to-end scenarios demonstrating the custody core's testable
//! properties, each run as a scripted narration against an in-process
//! `CustodyService` wired entirely from in-memory fakes, instead of a live
//! deployment.

use colored::*;
use custody_approval::IntentRecord;
use custody_db::{keys, CustodyStoreExt};
use custody_types::{Amount, ApproverRole, IntentState};

use super::world::{self, DemoWorld};

/// A valid strkey-encoded destination address, used throughout these
/// scenarios since `create_payment_intent` now rejects anything else.
const DEMO_DESTINATION: &str = "GADQOBYHA4DQOBYHA4DQOBYHA4DQOBYHA4DQOBYHA4DQOBYHA4DQOZPI";

fn print_intent(label: &str, intent: &IntentRecord) {
    println!(
        "  {} {} tier={} state={} approvals={}/{}",
        "»".bright_black(),
        label,
        format!("{:?}", intent.tier).bright_cyan(),
        format!("{:?}", intent.state).bright_yellow(),
        intent.valid_approvals,
        intent.threshold(),
    );
}

/// Scenario 1: happy path, HIGH_VALUE.
pub async fn happy_path() -> anyhow::Result<()> {
    println!("{}", "Scenario 1: happy path, HIGH_VALUE".bright_white().bold());
    let world = world::build().await;

    let wallets = world.service.provision_wallets().await?;
    let intent = world
        .service
        .create_payment_intent(
            wallets.hot_wallet_id,
            DEMO_DESTINATION.to_string(),
            Amount::from_xlm(5_000)?,
            None,
        )
        .await?;
    print_intent("created", &intent);

    for role in [ApproverRole::Ceo, ApproverRole::Cfo] {
        let approver = world.approver(role);
        let code = world.code_for(approver);
        let outcome = world.service.submit_approval(intent.intent_id, approver, &code).await?;
        println!(
            "  {} {} approved ({}/{})",
            "✓".bright_green(),
            role,
            outcome.valid_approvals,
            outcome.threshold
        );
    }

    let finished = world.service.get_intent(intent.intent_id).await?;
    print_intent("final", &finished);
    assert_eq!(finished.state, IntentState::Success);

    if let Some(ephemeral_id) = finished.ephemeral_key_id {
        if let Some(ephemeral) = world.service.get_ephemeral_key(ephemeral_id).await? {
            println!("  {} ephemeral key now {:?}", "✓".bright_green(), ephemeral.state);
        }
    }

    Ok(())
}

/// Scenario 2: cold outflow, CRITICAL regardless of amount.
pub async fn cold_outflow_critical() -> anyhow::Result<()> {
    println!("{}", "Scenario 2: cold outflow is always CRITICAL".bright_white().bold());
    let world = world::build().await;

    let wallets = world.service.provision_wallets().await?;
    let intent = world
        .service
        .create_payment_intent(wallets.cold_wallet_id, DEMO_DESTINATION.to_string(), Amount::from_xlm(500)?, None)
        .await?;
    print_intent("created", &intent);
    assert_eq!(intent.tier, custody_types::Tier::Critical);

    let ceo = world.approver(ApproverRole::Ceo);
    let code = world.code_for(ceo);
    let outcome = world.service.submit_approval(intent.intent_id, ceo, &code).await?;
    println!(
        "  {} single approval leaves intent unresolved ({}/{}, reached_threshold={})",
        "✓".bright_green(),
        outcome.valid_approvals,
        outcome.threshold,
        outcome.reached_threshold
    );
    assert!(!outcome.reached_threshold);

    Ok(())
}

/// Scenario 3: replay rejection across two different intents.
pub async fn replay_rejection() -> anyhow::Result<()> {
    println!("{}", "Scenario 3: a used response cannot be replayed".bright_white().bold());
    let world = world::build().await;

    let wallets = world.service.provision_wallets().await?;
    let first = world
        .service
        .create_payment_intent(wallets.hot_wallet_id, DEMO_DESTINATION.to_string(), Amount::from_xlm(5_000)?, None)
        .await?;

    let ceo = world.approver(ApproverRole::Ceo);
    let cfo = world.approver(ApproverRole::Cfo);
    let code = world.code_for(ceo);
    world.service.submit_approval(first.intent_id, ceo, &code).await?;
    let cfo_code = world.code_for(cfo);
    world.service.submit_approval(first.intent_id, cfo, &cfo_code).await?;

    let second = world
        .service
        .create_payment_intent(wallets.hot_wallet_id, DEMO_DESTINATION.to_string(), Amount::from_xlm(5_000)?, None)
        .await?;

    match world.service.submit_approval(second.intent_id, ceo, &code).await {
        Err(err) => println!("  {} replayed response rejected: {}", "✓".bright_green(), err),
        Ok(_) => println!("  {} replayed response was unexpectedly accepted", "✗".bright_red()),
    }

    Ok(())
}

/// Scenario 4: expiry sweep cancels an unapproved intent.
pub async fn expiry_sweep() -> anyhow::Result<()> {
    println!("{}", "Scenario 4: expiry sweep cancels a stale intent".bright_white().bold());
    let world = world::build().await;

    let wallets = world.service.provision_wallets().await?;
    let intent = world
        .service
        .create_payment_intent(wallets.hot_wallet_id, DEMO_DESTINATION.to_string(), Amount::from_xlm(5_000)?, None)
        .await?;

    let ceo = world.approver(ApproverRole::Ceo);
    let code = world.code_for(ceo);
    world.service.submit_approval(intent.intent_id, ceo, &code).await?;

    world.clock.advance(2 * world.service.config().approval.challenge_ttl_seconds * 1000 + 1_000);

    let cancelled = world.service.cancel_expired_intents(100).await?;
    let swept = world.service.sweep_expired_ephemeral_keys(100).await?;
    println!("  {} cancelled {} intent(s), swept {} ephemeral key(s)", "✓".bright_green(), cancelled, swept);

    let final_state = world.service.get_intent(intent.intent_id).await?;
    print_intent("final", &final_state);
    assert_eq!(final_state.state, IntentState::Cancelled);

    Ok(())
}

/// Scenario 5: two approvers racing the Nth approval slot.
pub async fn concurrent_nth_approval() -> anyhow::Result<()> {
    println!("{}", "Scenario 5: concurrent Nth approval, exactly one wins".bright_white().bold());
    let world = std::sync::Arc::new(world::build().await);

    let wallets = world.service.provision_wallets().await?;
    let intent = world
        .service
        .create_payment_intent(wallets.hot_wallet_id, DEMO_DESTINATION.to_string(), Amount::from_xlm(5_000)?, None)
        .await?;

    let ceo = world.approver(ApproverRole::Ceo);
    let code = world.code_for(ceo);
    world.service.submit_approval(intent.intent_id, ceo, &code).await?;

    let cfo = world.approver(ApproverRole::Cfo);
    let cto = world.approver(ApproverRole::Cto);
    let cfo_code = world.code_for(cfo);
    let cto_code = world.code_for(cto);

    let intent_id = intent.intent_id;
    let (w1, w2) = (world.clone(), world.clone());
    let (r1, r2) = tokio::join!(
        tokio::spawn(async move { w1.service.submit_approval(intent_id, cfo, &cfo_code).await }),
        tokio::spawn(async move { w2.service.submit_approval(intent_id, cto, &cto_code).await }),
    );

    let outcomes = [r1?, r2?];
    let winners = outcomes.iter().filter(|o| o.as_ref().map(|o| o.reached_threshold).unwrap_or(false)).count();
    println!("  {} exactly one caller observed the threshold transition: {}", "✓".bright_green(), winners == 1);

    let final_state = world.service.get_intent(intent_id).await?;
    print_intent("final", &final_state);

    Ok(())
}

/// Scenario 6: reconcile an intent stuck mid-execution after a simulated
/// HSM/ledger timeout.
pub async fn hsm_outage_reconciliation() -> anyhow::Result<()> {
    println!("{}", "Scenario 6: reconcile after a simulated HSM outage".bright_white().bold());
    let world: DemoWorld = world::build().await;

    let wallets = world.service.provision_wallets().await?;
    let intent = world
        .service
        .create_payment_intent(wallets.hot_wallet_id, DEMO_DESTINATION.to_string(), Amount::from_xlm(5_000)?, None)
        .await?;

    // Simulate threshold having been reached and execution stalling before
    // the ledger hash was ever recorded - the state an HSM sign timeout
    // would leave behind.
    let store = world.service.store();
    let key = format!("{}{}", keys::INTENT, intent.intent_id);
    let mut stuck: IntentRecord = store
        .get_json(&key)
        .await?
        .expect("intent was just created");
    stuck.state = IntentState::Executing;
    store.put_json(&key, &stuck).await?;

    let resolved = world.service.reconcile_intent(intent.intent_id).await?;
    println!("  {} reconciled to {:?} (ephemeral key never reached destroyed)", "✓".bright_green(), resolved);
    assert_eq!(resolved, IntentState::Failed);

    Ok(())
}

pub async fn run_all() -> anyhow::Result<()> {
    happy_path().await?;
    println!();
    cold_outflow_critical().await?;
    println!();
    replay_rejection().await?;
    println!();
    expiry_sweep().await?;
    println!();
    concurrent_nth_approval().await?;
    println!();
    hsm_outage_reconciliation().await?;
    Ok(())
}
