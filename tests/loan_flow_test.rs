use chrono::NaiveDate;
use loanbook::config::{LoanConfig, RecalculationPolicy};
use loanbook::domain::ledger::LoanApplication;
use loanbook::domain::loan::{LoanCategory, LoanState};
use loanbook::domain::money::Amount;
use loanbook::domain::ports::{BorrowerStore, LoanStore, TransactionStore};
use loanbook::domain::transaction::Direction;
use loanbook::error::LoanError;
use rust_decimal_macros::dec;

mod common;
use common::{Harness, at};

fn six_month_loan(borrower_id: u64) -> LoanApplication {
    LoanApplication {
        borrower_id,
        category: LoanCategory::Personal,
        principal: 100000,
        annual_rate: dec!(18),
        term_months: 6,
        disbursal_date: NaiveDate::from_ymd_opt(2024, 1, 20).unwrap(),
    }
}

async fn score_of(h: &Harness, borrower_id: u64) -> Option<u16> {
    BorrowerStore::get(&h.store, borrower_id)
        .await
        .unwrap()
        .unwrap()
        .credit_score
        .map(|s| s.value())
}

#[tokio::test]
async fn test_score_gates_application_until_balance_grows() {
    let h = Harness::new(LoanConfig::default());
    let borrower = h.register("gate", dec!(500000)).await;

    let unscored = h.engine.apply_for_loan(six_month_loan(borrower.id)).await;
    assert!(matches!(unscored, Err(LoanError::Ineligible { .. })));

    h.deposit(&borrower, Direction::Credit, dec!(250000)).await;
    assert_eq!(score_of(&h, borrower.id).await, Some(400));
    assert!(matches!(
        h.engine.apply_for_loan(six_month_loan(borrower.id)).await,
        Err(LoanError::Ineligible { .. })
    ));

    h.deposit(&borrower, Direction::Credit, dec!(200000)).await;
    let approval = h.engine.apply_for_loan(six_month_loan(borrower.id)).await.unwrap();
    assert_eq!(approval.monthly_emi, dec!(17552.52));
    assert_eq!(approval.due_dates.len(), 6);
    assert_eq!(
        approval.due_dates[0].due_date,
        NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
    );
    h.shutdown().await;
}

#[tokio::test]
async fn test_loan_runs_to_closure() {
    let h = Harness::new(LoanConfig::default());
    let borrower = h.register("close", dec!(500000)).await;
    h.deposit(&borrower, Direction::Credit, dec!(600000)).await;
    let approval = h.engine.apply_for_loan(six_month_loan(borrower.id)).await.unwrap();

    let mut last = None;
    for month in 2..=7 {
        let receipt = h
            .engine
            .apply_payment(approval.loan_id, Amount::new(dec!(17552.52)).unwrap(), at(2024, month, 1))
            .await
            .unwrap();
        last = Some(receipt);
    }
    let last = last.unwrap();
    assert!(!last.active);
    assert_eq!(last.installments_remaining, 0);
    assert_eq!(last.remaining_balance, dec!(0));
    assert_eq!(last.next_due_amount, dec!(0));
    assert_eq!(h.engine.loan_state(borrower.id).await.unwrap(), LoanState::Closed);

    let after_close = h
        .engine
        .apply_payment(approval.loan_id, Amount::new(dec!(1)).unwrap(), at(2024, 8, 1))
        .await;
    assert!(matches!(after_close, Err(LoanError::InactiveLoan(_))));
    assert!(matches!(
        h.engine.statement(approval.loan_id).await,
        Err(LoanError::InactiveLoan(_))
    ));

    let repayments = h
        .store
        .by_loan(approval.loan_id, Some(Direction::Credit))
        .await
        .unwrap();
    assert_eq!(repayments.len(), 6);

    // A closed loan does not block the next one.
    let next = h.engine.apply_for_loan(six_month_loan(borrower.id)).await.unwrap();
    assert_ne!(next.loan_id, approval.loan_id);
    assert_eq!(h.engine.loan_state(borrower.id).await.unwrap(), LoanState::Active);
    h.shutdown().await;
}

#[tokio::test]
async fn test_rejections_leave_state_untouched() {
    let h = Harness::new(LoanConfig::default());
    let borrower = h.register("reject", dec!(500000)).await;
    h.deposit(&borrower, Direction::Credit, dec!(600000)).await;

    let mut low_rate = six_month_loan(borrower.id);
    low_rate.annual_rate = dec!(10);
    assert!(matches!(
        h.engine.apply_for_loan(low_rate).await,
        Err(LoanError::RateTooLow { .. })
    ));
    let mut at_floor = six_month_loan(borrower.id);
    at_floor.annual_rate = dec!(14);
    assert!(matches!(
        h.engine.apply_for_loan(at_floor).await,
        Err(LoanError::RateTooLow { .. })
    ));
    assert!(h.store.find_by_borrower(borrower.id).await.unwrap().is_empty());

    let approval = h.engine.apply_for_loan(six_month_loan(borrower.id)).await.unwrap();
    let snapshot = (
        LoanStore::get(&h.store, approval.loan_id).await.unwrap(),
        h.store.progress(approval.loan_id).await.unwrap(),
    );

    let overpay = h
        .engine
        .apply_payment(approval.loan_id, Amount::new(dec!(200000)).unwrap(), at(2024, 2, 1))
        .await;
    assert!(matches!(overpay, Err(LoanError::Overpayment { .. })));
    assert!(matches!(
        h.engine.apply_for_loan(six_month_loan(borrower.id)).await,
        Err(LoanError::DuplicateLoan { .. })
    ));

    assert_eq!(
        (
            LoanStore::get(&h.store, approval.loan_id).await.unwrap(),
            h.store.progress(approval.loan_id).await.unwrap(),
        ),
        snapshot
    );
    assert!(h.store.by_loan(approval.loan_id, None).await.unwrap().is_empty());
    h.shutdown().await;
}

#[tokio::test]
async fn test_payment_window_guards() {
    let h = Harness::new(LoanConfig::default());
    let borrower = h.register("window", dec!(500000)).await;
    h.deposit(&borrower, Direction::Credit, dec!(600000)).await;
    let approval = h.engine.apply_for_loan(six_month_loan(borrower.id)).await.unwrap();
    let emi = Amount::new(dec!(17552.52)).unwrap();

    h.engine.apply_payment(approval.loan_id, emi, at(2024, 2, 5)).await.unwrap();
    assert!(matches!(
        h.engine.apply_payment(approval.loan_id, emi, at(2024, 2, 28)).await,
        Err(LoanError::AlreadyPaid { .. })
    ));
    assert!(matches!(
        h.engine.apply_payment(approval.loan_id, emi, at(2024, 4, 5)).await,
        Err(LoanError::PaymentWindowElapsed { .. })
    ));
    let receipt = h.engine.apply_payment(approval.loan_id, emi, at(2024, 3, 4)).await.unwrap();
    assert_eq!(receipt.installments_remaining, 4);
    h.shutdown().await;
}

#[tokio::test]
async fn test_partial_payment_policies() {
    for (policy, expected_next) in [
        (RecalculationPolicy::NextInstallment, dec!(15808.34)),
        (RecalculationPolicy::Reamortize, dec!(18012.62)),
    ] {
        let config = LoanConfig {
            recalculation: policy,
            ..LoanConfig::default()
        };
        let h = Harness::new(config);
        let borrower = h.register("partial", dec!(500000)).await;
        h.deposit(&borrower, Direction::Credit, dec!(600000)).await;
        let approval = h.engine.apply_for_loan(six_month_loan(borrower.id)).await.unwrap();

        let receipt = h
            .engine
            .apply_payment(approval.loan_id, Amount::new(dec!(15252.02)).unwrap(), at(2024, 2, 1))
            .await
            .unwrap();
        assert_eq!(receipt.remaining_balance, dec!(90063.10));
        assert_eq!(receipt.next_due_amount, expected_next, "{policy:?}");
        assert_eq!(receipt.installments_remaining, 5);
        h.shutdown().await;
    }
}

#[tokio::test]
async fn test_statement_after_payments() {
    let h = Harness::new(LoanConfig::default());
    let borrower = h.register("statement", dec!(500000)).await;
    h.deposit(&borrower, Direction::Credit, dec!(600000)).await;
    let approval = h.engine.apply_for_loan(six_month_loan(borrower.id)).await.unwrap();
    let emi = Amount::new(dec!(17552.52)).unwrap();
    h.engine.apply_payment(approval.loan_id, emi, at(2024, 2, 1)).await.unwrap();
    h.engine.apply_payment(approval.loan_id, emi, at(2024, 3, 1)).await.unwrap();

    let statement = h.engine.statement(approval.loan_id).await.unwrap();
    assert_eq!(statement.past_transactions.len(), 2);
    assert!(
        statement
            .past_transactions
            .iter()
            .all(|p| p.principal == dec!(70210.08) && p.interest == dec!(18))
    );
    assert_eq!(statement.upcoming_installments.len(), 4);
    assert_eq!(statement.upcoming_installments[0].amount_due, dec!(17552.52));
    assert_eq!(
        statement.upcoming_installments[0].emi_date,
        NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
    );
    h.shutdown().await;
}

#[tokio::test]
async fn test_repayments_raise_the_score() {
    let h = Harness::new(LoanConfig::default());
    let borrower = h.register("rescore", dec!(500000)).await;
    h.deposit(&borrower, Direction::Credit, dec!(400000)).await;
    let before = score_of(&h, borrower.id).await;
    let approval = h.engine.apply_for_loan(six_month_loan(borrower.id)).await.unwrap();

    h.engine
        .apply_payment(approval.loan_id, Amount::new(dec!(17552.52)).unwrap(), at(2024, 2, 1))
        .await
        .unwrap();
    h.queue.flush().await.unwrap();

    let after = score_of(&h, borrower.id).await;
    assert_eq!(before, Some(500));
    assert_eq!(after, Some(510));
    h.shutdown().await;
}

fn personal_loan(borrower_id: u64) -> LoanApplication {
    LoanApplication {
        borrower_id,
        category: LoanCategory::Personal,
        principal: 120000,
        annual_rate: dec!(15),
        term_months: 12,
        disbursal_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
    }
}

#[tokio::test]
async fn test_full_early_payoff_closes_loan() {
    let h = Harness::new(LoanConfig::default());
    let borrower = h.register("payoff", dec!(600000)).await;
    h.deposit(&borrower, Direction::Credit, dec!(500000)).await;
    let approval = h.engine.apply_for_loan(personal_loan(borrower.id)).await.unwrap();

    let receipt = h
        .engine
        .apply_payment(approval.loan_id, Amount::new(dec!(129972.00)).unwrap(), at(2024, 2, 1))
        .await
        .unwrap();
    assert_eq!(receipt.remaining_balance, dec!(0));
    assert_eq!(receipt.installments_remaining, 0);
    assert!(!receipt.active);
    assert_eq!(h.engine.loan_state(borrower.id).await.unwrap(), LoanState::Closed);

    assert!(matches!(
        h.engine
            .apply_payment(approval.loan_id, Amount::new(dec!(0.01)).unwrap(), at(2024, 3, 1))
            .await,
        Err(LoanError::InactiveLoan(_))
    ));
    assert!(matches!(
        h.engine.statement(approval.loan_id).await,
        Err(LoanError::InactiveLoan(_))
    ));

    let next = h.engine.apply_for_loan(personal_loan(borrower.id)).await.unwrap();
    assert_ne!(next.loan_id, approval.loan_id);
    h.shutdown().await;
}

#[tokio::test]
async fn test_overpayment_then_due_amounts_runs_to_closure() {
    let h = Harness::new(LoanConfig::default());
    let borrower = h.register("ahead", dec!(600000)).await;
    h.deposit(&borrower, Direction::Credit, dec!(500000)).await;
    let approval = h.engine.apply_for_loan(personal_loan(borrower.id)).await.unwrap();

    let mut receipt = h
        .engine
        .apply_payment(approval.loan_id, Amount::new(dec!(20000)).unwrap(), at(2024, 2, 1))
        .await
        .unwrap();
    assert_eq!(receipt.remaining_balance, dec!(109972.00));
    assert!(receipt.next_due_amount < dec!(10831.00));

    let mut month = 3;
    let mut year = 2024;
    let mut payments = 1;
    while receipt.active {
        assert!(receipt.next_due_amount > dec!(0));
        assert!(receipt.next_due_amount <= receipt.remaining_balance);
        receipt = h
            .engine
            .apply_payment(
                approval.loan_id,
                Amount::new(receipt.next_due_amount).unwrap(),
                at(year, month, 1),
            )
            .await
            .unwrap();
        payments += 1;
        assert!(receipt.remaining_balance >= dec!(0));
        assert!(payments <= 12, "loan still open after {payments} payments");
        if month == 12 {
            month = 1;
            year += 1;
        } else {
            month += 1;
        }
    }

    assert_eq!(receipt.remaining_balance, dec!(0));
    assert_eq!(receipt.installments_remaining, 0);
    assert_eq!(h.engine.loan_state(borrower.id).await.unwrap(), LoanState::Closed);
    h.shutdown().await;
}
