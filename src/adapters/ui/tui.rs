//! Implements InputPort. Inquire-based interactive menu over the use cases.

use crate::adapters::export::write_overdue_report;
use crate::adapters::gateway::CachedGateway;
use crate::adapters::ui::banner::{CYBER_GREEN, NEON_PURPLE};
use crate::adapters::ui::progress::with_spinner;
use crate::domain::entities::parse_date;
use crate::domain::pricing::format_amount;
use crate::domain::{
    DashboardStats, DomainError, OverduePayment, PaymentStatus, TaskStatus, total_price,
};
use crate::ports::InputPort;
use crate::usecases::{
    DashboardService, DashboardState, DashboardWatcher, PaymentService, PricingService,
};
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, Utc};
use inquire::ui::{Color, RenderConfig, Styled};
use inquire::{Confirm, CustomType, InquireError, MultiSelect, Select, Text};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuAction {
    Dashboard,
    Overdue,
    Pricing,
    RecordPayment,
    CompleteTask,
    ExportOverdue,
    Watch,
    Refresh,
    Quit,
}

impl MenuAction {
    const ALL: [MenuAction; 9] = [
        MenuAction::Dashboard,
        MenuAction::Overdue,
        MenuAction::Pricing,
        MenuAction::RecordPayment,
        MenuAction::CompleteTask,
        MenuAction::ExportOverdue,
        MenuAction::Watch,
        MenuAction::Refresh,
        MenuAction::Quit,
    ];
}

impl fmt::Display for MenuAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MenuAction::Dashboard => "Dashboard",
            MenuAction::Overdue => "Overdue payments",
            MenuAction::Pricing => "Price calculator",
            MenuAction::RecordPayment => "Record payment",
            MenuAction::CompleteTask => "Complete task",
            MenuAction::ExportOverdue => "Export overdue payments (CSV)",
            MenuAction::Watch => "Watch dashboard (Ctrl-C to stop)",
            MenuAction::Refresh => "Refresh data",
            MenuAction::Quit => "Quit",
        };
        f.write_str(label)
    }
}

/// Neon theme for all inquire prompts.
pub fn apply_theme() {
    let purple = Color::Rgb {
        r: NEON_PURPLE.0,
        g: NEON_PURPLE.1,
        b: NEON_PURPLE.2,
    };
    let green = Color::Rgb {
        r: CYBER_GREEN.0,
        g: CYBER_GREEN.1,
        b: CYBER_GREEN.2,
    };
    let mut config = RenderConfig::default_colored();
    config.prompt_prefix = Styled::new("›").with_fg(purple);
    config.answered_prompt_prefix = Styled::new("✓").with_fg(green);
    config.highlighted_option_prefix = Styled::new("▸").with_fg(green);
    config.selected_checkbox = Styled::new("[x]").with_fg(green);
    inquire::set_global_render_config(config);
}

/// Esc and Ctrl-C inside a prompt mean "back", not failure.
fn is_cancel(e: &InquireError) -> bool {
    matches!(
        e,
        InquireError::OperationCanceled | InquireError::OperationInterrupted
    )
}

fn ui_err(e: InquireError) -> DomainError {
    DomainError::Ui(e.to_string())
}

/// Run a prompt; `Ok(None)` when the user backed out.
fn ask<T>(result: Result<T, InquireError>) -> Result<Option<T>, DomainError> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e) if is_cancel(&e) => Ok(None),
        Err(e) => Err(ui_err(e)),
    }
}

/// One clock reading per menu action. "Today" is the UTC calendar date of
/// `now`, the same calendar the dashboard uses for "this month".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Clock {
    now: DateTime<Utc>,
}

impl Clock {
    fn read() -> Self {
        Self { now: Utc::now() }
    }

    fn today(self) -> NaiveDate {
        self.now.date_naive()
    }
}

/// TUI adapter. Inquire prompts.
pub struct TuiInputPort {
    gateway: Arc<CachedGateway>,
    dashboard: Arc<DashboardService>,
    pricing: Arc<PricingService>,
    payments: Arc<PaymentService>,
    watcher: Arc<DashboardWatcher>,
    export_dir: PathBuf,
}

impl TuiInputPort {
    pub fn new(
        gateway: Arc<CachedGateway>,
        dashboard: Arc<DashboardService>,
        pricing: Arc<PricingService>,
        payments: Arc<PaymentService>,
        watcher: Arc<DashboardWatcher>,
        export_dir: PathBuf,
    ) -> Self {
        Self {
            gateway,
            dashboard,
            pricing,
            payments,
            watcher,
            export_dir,
        }
    }

    async fn dispatch(&self, action: MenuAction) -> Result<(), DomainError> {
        let clock = Clock::read();
        match action {
            MenuAction::Dashboard => self.show_dashboard(clock).await,
            MenuAction::Overdue => self.show_overdue(clock).await,
            MenuAction::Pricing => self.price_calculator().await,
            MenuAction::RecordPayment => self.record_payment(clock).await,
            MenuAction::CompleteTask => self.complete_task().await,
            MenuAction::ExportOverdue => self.export_overdue(clock).await,
            MenuAction::Watch => self.watch_dashboard().await,
            MenuAction::Refresh => {
                self.gateway.invalidate_all().await;
                self.watcher.refresh().await;
                println!("Cached data dropped; next views reload from the backend.");
                Ok(())
            }
            MenuAction::Quit => Ok(()),
        }
    }

    async fn show_dashboard(&self, clock: Clock) -> Result<(), DomainError> {
        let stats = with_spinner("Loading dashboard", self.dashboard.stats(clock.now)).await?;
        print_stats(&stats);
        Ok(())
    }

    async fn show_overdue(&self, clock: Clock) -> Result<(), DomainError> {
        let today = clock.today();
        let rows = with_spinner(
            "Loading overdue payments",
            self.dashboard.overdue_payments(today),
        )
        .await?;
        print_overdue(&rows);
        Ok(())
    }

    async fn price_calculator(&self) -> Result<(), DomainError> {
        let domains = with_spinner("Loading domains", self.pricing.domains()).await?;
        if domains.is_empty() {
            println!("No service domains defined.");
            return Ok(());
        }
        let names: Vec<String> = domains
            .iter()
            .map(|d| d.name.clone().unwrap_or_else(|| d.id.clone()))
            .collect();
        let Some(picked) = ask(MultiSelect::new("Domains to price:", names).raw_prompt())? else {
            return Ok(());
        };
        if picked.is_empty() {
            return Ok(());
        }
        let Some(base_amount) = ask(
            CustomType::<f64>::new("Base amount (Esc to skip):")
                .with_error_message("Enter a number")
                .prompt_skippable(),
        )?
        else {
            return Ok(());
        };

        let ids: Vec<String> = picked.iter().map(|o| domains[o.index].id.clone()).collect();
        let results = self.pricing.resolve_prices(&ids, base_amount).await;

        print_heading("Pricing");
        for r in &results {
            let name = r.domain_name.as_deref().unwrap_or(&r.domain_id);
            let flag = if r.is_missing_base() { "  (!)" } else { "" };
            println!("  {:<24} {:>12}  {}{}", name, format_amount(r.price), r.explanation, flag);
        }
        let skipped = ids.len() - results.len();
        if skipped > 0 {
            println!("  {} domain(s) without pricing skipped", skipped);
        }
        println!("  {:<24} {:>12}", "Total", format_amount(total_price(&results)));
        Ok(())
    }

    async fn record_payment(&self, clock: Clock) -> Result<(), DomainError> {
        let deals: Vec<_> = with_spinner("Loading deals", self.payments.deals())
            .await?
            .into_iter()
            .filter(|d| d.payment_status != PaymentStatus::Paid)
            .collect();
        if deals.is_empty() {
            println!("No deals awaiting payment.");
            return Ok(());
        }
        let labels: Vec<String> = deals
            .iter()
            .map(|d| {
                let client = d
                    .contact
                    .as_ref()
                    .and_then(|c| c.display_name())
                    .unwrap_or_default();
                format!(
                    "{} {} ({} / {})",
                    d.title.as_deref().unwrap_or(&d.id),
                    client,
                    format_amount(d.amount_paid_or_zero()),
                    format_amount(d.amount_total_or_zero())
                )
            })
            .collect();
        let Some(choice) = ask(Select::new("Deal:", labels).raw_prompt())? else {
            return Ok(());
        };
        let deal = &deals[choice.index];

        let Some(amount) = ask(
            CustomType::<f64>::new("Amount:")
                .with_error_message("Enter a number")
                .prompt(),
        )?
        else {
            return Ok(());
        };

        let today = clock.today().format("%Y-%m-%d").to_string();
        let Some(date_raw) = ask(
            Text::new("Payment date (YYYY-MM-DD):")
                .with_default(&today)
                .prompt(),
        )?
        else {
            return Ok(());
        };
        let paid_on: NaiveDate = parse_date(&date_raw)
            .ok_or_else(|| DomainError::InvalidInput(format!("not a date: {}", date_raw)))?;

        let receipt = self.payments.record_payment(&deal.id, amount, paid_on).await?;
        println!(
            "Recorded {} on {}; deal is now {} ({} / {}).",
            format_amount(amount),
            paid_on,
            receipt.deal.payment_status.as_str(),
            format_amount(receipt.deal.amount_paid_or_zero()),
            format_amount(receipt.deal.amount_total_or_zero())
        );
        Ok(())
    }

    async fn complete_task(&self) -> Result<(), DomainError> {
        let tasks = with_spinner("Loading tasks", self.payments.open_tasks()).await?;
        if tasks.is_empty() {
            println!("No open tasks.");
            return Ok(());
        }
        let labels: Vec<String> = tasks
            .iter()
            .map(|t| {
                let due = t.due_date.as_deref().unwrap_or("no due date");
                format!("{} [{}]", t.title.as_deref().unwrap_or(&t.id), due)
            })
            .collect();
        let Some(choice) = ask(Select::new("Task:", labels).raw_prompt())? else {
            return Ok(());
        };
        let task = self
            .payments
            .set_task_status(&tasks[choice.index].id, TaskStatus::Done)
            .await?;
        println!("Task {} marked done.", task.title.as_deref().unwrap_or(&task.id));
        Ok(())
    }

    async fn export_overdue(&self, clock: Clock) -> Result<(), DomainError> {
        let today = clock.today();
        let rows = with_spinner(
            "Loading overdue payments",
            self.dashboard.overdue_payments(today),
        )
        .await?;
        if rows.is_empty() {
            let Some(true) = ask(Confirm::new("Nothing is overdue. Export an empty file?")
                .with_default(false)
                .prompt())?
            else {
                return Ok(());
            };
        }
        let path = write_overdue_report(&self.export_dir, &rows, today).await?;
        println!("Exported {} row(s) to {}", rows.len(), path.display());
        Ok(())
    }

    /// Live dashboard until Ctrl-C: the watcher refreshes on its interval and
    /// whenever a write goes through the cached gateway.
    async fn watch_dashboard(&self) -> Result<(), DomainError> {
        let mut rx = self.watcher.subscribe();
        let changes = self.gateway.subscribe();
        println!("Watching dashboard. Press Ctrl-C to return to the menu.");

        let render = async {
            while rx.changed().await.is_ok() {
                let state = rx.borrow_and_update().clone();
                print_state(&state);
            }
        };

        tokio::select! {
            _ = self.watcher.run_loop(Some(changes)) => {}
            _ = render => {}
            _ = tokio::signal::ctrl_c() => {
                info!("dashboard watch stopped");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl InputPort for TuiInputPort {
    async fn run(&self) -> Result<(), DomainError> {
        loop {
            let action = match ask(Select::new("Menu:", MenuAction::ALL.to_vec()).prompt())? {
                Some(MenuAction::Quit) | None => return Ok(()),
                Some(action) => action,
            };
            if let Err(e) = self.dispatch(action).await {
                report_error(&e);
            }
        }
    }
}

/// Fetch failures are shown apart from input/local errors so they are never
/// read as "no data".
fn report_error(e: &DomainError) {
    if e.is_fetch_failure() {
        eprintln!("Could not load data from the backend: {}", e);
    } else {
        eprintln!("{}", e);
    }
}

fn print_heading(title: &str) {
    println!();
    println!("== {} ==", title);
}

fn print_stats(s: &DashboardStats) {
    print_heading("Dashboard");
    println!("  Total revenue      {:>14}", format_amount(s.total_revenue));
    println!("  This month         {:>14}", format_amount(s.monthly_revenue));
    println!("  Active clients     {:>14}", s.active_clients);
    println!("  Open deals         {:>14}", s.open_deals);
    println!("  Pending payments   {:>14}", s.pending_payments);
    println!(
        "  Tasks done         {:>14}",
        format!("{}/{}", s.completed_tasks, s.total_tasks)
    );
    println!("  Upcoming events    {:>14}", s.upcoming_events);
    if !s.deals_by_stage.is_empty() {
        println!("  Deals by stage:");
        for sc in &s.deals_by_stage {
            println!("    {:<20} {:>6}", sc.stage, sc.count);
        }
    }
}

fn print_state(state: &DashboardState) {
    match state {
        DashboardState::Loading => println!("Loading..."),
        DashboardState::Ready(stats) => {
            println!("[{}]", Local::now().format("%H:%M:%S"));
            print_stats(stats);
        }
        DashboardState::Failed(msg) => eprintln!("Could not load data from the backend: {}", msg),
    }
}

fn print_overdue(rows: &[OverduePayment]) {
    print_heading("Overdue payments");
    if rows.is_empty() {
        println!("  Nothing overdue.");
        return;
    }
    for r in rows {
        println!(
            "  {:<24} {:<16} {:>12} pending  {:>4}d  due {}  [{}]",
            r.client_name,
            r.client_phone.as_deref().unwrap_or("-"),
            format_amount(r.amount_pending),
            r.days_overdue,
            r.due_date,
            r.payment_status.label()
        );
    }
    let pending: f64 = rows.iter().map(|r| r.amount_pending).sum();
    println!("  {} payment(s), {} pending", rows.len(), format_amount(pending));
}
