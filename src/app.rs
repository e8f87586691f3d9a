//! Explicit application context and subcommand dispatch.

use crate::alerts::AlertPolicy;
use crate::auth::{AuthError, AuthService, SignupRequest};
use crate::cli::{
    BackendConfigCommands, Commands, DirectionArg, PageArg, PollArgs, SettingsCommands, UsersCommands, WatchView,
};
use crate::client::{ApiError, NavalClient};
use crate::config::Config;
use crate::debounce::Debouncer;
use crate::i18n::{self, Language};
use crate::models::naval::{BackendConfigUpdate, LogQuery, NavalSystem, SystemId, User, UserId, UserUpdate};
use crate::sensor_data::sensor_label;
use crate::services::dashboard::DashboardView;
use crate::services::monitor::Monitor;
use crate::services::poller::{run_loop, stop_pair, StopHandle};
use crate::services::simulation::SimulationView;
use crate::services::{faults, logs};
use crate::settings::{Direction, Page, Settings, SettingsStore};
use crate::storage::StateDir;
use log::{info, warn};
use std::io::{self, BufRead, BufReader, IsTerminal};
use std::thread;
use std::time::Duration;

pub struct AppContext {
    pub config: Config,
    pub client: NavalClient,
    pub state: StateDir,
    pub settings_store: SettingsStore,
    pub settings: Settings,
    pub language: Language,
}

impl AppContext {
    pub fn new(config: Config, language_override: Option<Language>) -> Self {
        let client = NavalClient::new(&config.api_url, config.http_timeout);
        let state = StateDir::new(config.state_dir.clone());
        let settings_store = SettingsStore::new(state.clone());
        let settings = settings_store.load();
        let language = language_override.unwrap_or(settings.language);
        AppContext {
            config,
            client,
            state,
            settings_store,
            settings,
            language,
        }
    }

    /// CLI flag, then environment, then persisted settings.
    pub fn refresh_interval(&self, flag_ms: Option<u64>) -> Duration {
        flag_ms
            .map(|ms| Duration::from_millis(ms.max(crate::settings::MIN_REFRESH_MS)))
            .or(self.config.refresh_interval)
            .unwrap_or_else(|| self.settings.refresh_interval())
    }

    pub fn alert_policy(&self) -> AlertPolicy {
        AlertPolicy {
            attack_cooldown: self.config.attack_alert_cooldown,
            auto_recovery: self.config.auto_recovery,
        }
    }

    fn auth(&self) -> AuthService<NavalClient> {
        AuthService::new(self.client.clone(), self.state.clone())
    }

    fn require_session(&self) -> Result<User, String> {
        self.auth()
            .current_user()
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "not logged in; run `naval-console login <username>` first".to_string())
    }

    fn save_settings(&self) -> Result<(), String> {
        self.settings_store
            .save(&self.settings)
            .map_err(|e| format!("saving settings failed: {}", e))
    }

    fn api_error(&self, e: ApiError) -> String {
        if e.is_unreachable() {
            format!("{} ({})", i18n::text(self.language, "backend_unreachable"), e)
        } else {
            e.to_string()
        }
    }

    fn auth_error(&self, e: AuthError) -> String {
        match e {
            AuthError::InvalidCredentials => i18n::text(self.language, "invalid_credentials"),
            AuthError::Api(api) => self.api_error(api),
            other => other.to_string(),
        }
    }
}

fn read_password(password: Option<String>, stdin: bool, prompt: &str) -> Result<String, String> {
    if stdin {
        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| format!("Failed to read from stdin: {}", e))?;
        return Ok(line.trim_end_matches(['\r', '\n']).to_string());
    }
    if let Some(pwd) = password {
        return Ok(pwd);
    }
    if !io::stdin().is_terminal() {
        return Err("No password provided. Use --password or --stdin, or run interactively.".to_string());
    }
    rpassword::prompt_password(prompt).map_err(|e| format!("Failed to read password: {}", e))
}

fn stop_after(duration: Option<u64>, handles: Vec<StopHandle>) -> Option<thread::JoinHandle<()>> {
    let secs = duration?;
    Some(thread::spawn(move || {
        thread::sleep(Duration::from_secs(secs));
        info!("Run duration of {}s elapsed; stopping", secs);
        handles.iter().for_each(StopHandle::stop);
    }))
}

fn print_user(user: &User) {
    println!("{} ({}) <{}> role={} id={}", user.name, user.username, user.email, user.role, user.id);
}

fn print_system(system: &NavalSystem, lang: Language) {
    println!("{} ({}) relay {} [{}]", system.name, system.id, system.relay.id, system.relay.state);
    for sensor in &system.sensors {
        let near = sensor.warning_threshold().is_some_and(|t| sensor.value >= t);
        println!(
            "  {:<32} {:>10.2} {:<4} safe {}..{}{}",
            sensor_label(sensor, lang),
            sensor.value,
            sensor.unit,
            sensor.safe_min.map(|v| v.to_string()).unwrap_or_else(|| "-".into()),
            sensor.safe_max.map(|v| v.to_string()).unwrap_or_else(|| "-".into()),
            if near { "  near limit" } else { "" }
        );
    }
}

pub fn execute(ctx: &mut AppContext, command: Commands) -> Result<(), String> {
    let lang = ctx.language;
    match command {
        Commands::Monitor { poll, with_view } => run_monitor(ctx, poll, with_view),
        Commands::Watch { view, poll } => run_watch(ctx, view, poll),
        Commands::Systems => {
            let systems = ctx.client.get_systems().map_err(|e| ctx.api_error(e))?;
            let known: Vec<SystemId> = systems.iter().map(|s| s.id.clone()).collect();
            let before = ctx.settings.clone();
            ctx.settings.reconcile_layouts(&known);
            if ctx.settings != before {
                ctx.save_settings()?;
            }
            for system in ctx.settings.arrange(Page::Dashboard, &systems) {
                print_system(system, lang);
            }
            let hidden = systems.iter().filter(|s| ctx.settings.is_hidden(&s.id)).count();
            if hidden > 0 {
                println!("({} hidden system(s); see `settings toggle`)", hidden);
            }
            Ok(())
        }
        Commands::System { system_id } => {
            let system = ctx
                .client
                .get_system(&SystemId(system_id))
                .map_err(|e| ctx.api_error(e))?;
            print_system(&system, lang);
            Ok(())
        }
        Commands::Logs {
            limit,
            abnormal,
            search,
            severity,
        } => {
            let query = LogQuery {
                limit,
                abnormal_only: abnormal,
                search,
            };
            let found = logs::fetch_logs(&ctx.client, &query).map_err(|e| ctx.api_error(e))?;
            let found = logs::filter_severity(found, severity.map(Into::into));
            logs::print_logs(&mut io::stdout().lock(), &found, lang).map_err(|e| e.to_string())
        }
        Commands::Search {
            limit,
            abnormal,
            severity,
        } => {
            let base = LogQuery {
                limit,
                abnormal_only: abnormal,
                search: None,
            };
            if io::stdin().is_terminal() {
                eprintln!("Type a query per line; Ctrl-D to finish.");
            }
            logs::search_loop(
                &ctx.client,
                BufReader::new(io::stdin()),
                &mut io::stdout(),
                &base,
                severity.map(Into::into),
                Debouncer::default(),
                lang,
            )
            .map_err(|e| e.to_string())
        }
        Commands::Trip { system_id, duration, ip } => {
            ctx.require_session()?;
            let request = faults::relay_fault_request(&system_id, duration, ip.as_deref()).map_err(|e| e.to_string())?;
            let msg = faults::inject_relay_fault(&ctx.client, &request).map_err(|e| ctx.api_error(e))?;
            println!("{}", msg);
            Ok(())
        }
        Commands::Spoof {
            system_id,
            sensor_id,
            value,
            duration,
            ip,
        } => {
            ctx.require_session()?;
            let request = faults::sensor_attack_request(&system_id, &sensor_id, value, duration, ip.as_deref())
                .map_err(|e| e.to_string())?;
            let msg = faults::inject_sensor_attack(&ctx.client, &request).map_err(|e| ctx.api_error(e))?;
            println!("{}", msg);
            Ok(())
        }
        Commands::Relay { system_id, state } => {
            ctx.require_session()?;
            let msg = faults::set_relay_state(&ctx.client, &system_id, state).map_err(|e| ctx.api_error(e))?;
            println!("{}", msg);
            Ok(())
        }
        Commands::SetSensor {
            system_id,
            sensor_id,
            value,
        } => {
            ctx.require_session()?;
            let msg =
                faults::set_sensor_value(&ctx.client, &system_id, &sensor_id, value).map_err(|e| ctx.api_error(e))?;
            println!("{}", msg);
            Ok(())
        }
        Commands::BackendConfig { action } => run_backend_config(ctx, action),
        Commands::Login {
            username,
            password,
            stdin,
        } => {
            let password = read_password(password, stdin, "Password: ")?;
            let user = ctx.auth().login(&username, &password).map_err(|e| ctx.auth_error(e))?;
            println!("Logged in as {} ({})", user.name, user.role);
            Ok(())
        }
        Commands::Logout => {
            ctx.auth().logout().map_err(|e| ctx.auth_error(e))?;
            println!("Logged out");
            Ok(())
        }
        Commands::Whoami => {
            match ctx.auth().current_user().map_err(|e| ctx.auth_error(e))? {
                Some(user) => print_user(&user),
                None => println!("not logged in"),
            }
            Ok(())
        }
        Commands::Signup {
            username,
            name,
            email,
            password,
            stdin,
        } => {
            let password = read_password(password, stdin, "New password: ")?;
            let user = ctx
                .auth()
                .signup(SignupRequest {
                    username,
                    password,
                    name,
                    email,
                })
                .map_err(|e| ctx.auth_error(e))?;
            println!("Account created; logged in as {}", user.username);
            Ok(())
        }
        Commands::Users { action } => run_users(ctx, action),
        Commands::Profile {
            name,
            email,
            avatar,
            change_password,
        } => {
            let password = if change_password {
                Some(read_password(None, false, "New password: ")?)
            } else {
                None
            };
            let update = UserUpdate {
                name,
                email,
                avatar,
                password,
                role: None,
            };
            if update == UserUpdate::default() {
                return Err("nothing to update; pass --name, --email, --avatar or --change-password".into());
            }
            let user = ctx.auth().update_profile(update).map_err(|e| ctx.auth_error(e))?;
            print_user(&user);
            Ok(())
        }
        Commands::Settings { action } => run_settings(ctx, action),
    }
}

fn run_monitor(ctx: &AppContext, poll: PollArgs, with_view: bool) -> Result<(), String> {
    let interval = ctx.refresh_interval(poll.interval_ms);
    info!(
        "Starting monitor: interval={}ms, auto_recovery={}, attack_cooldown={}s",
        interval.as_millis(),
        ctx.config
            .auto_recovery
            .map(|d| format!("{}s", d.as_secs()))
            .unwrap_or_else(|| "off".to_string()),
        ctx.config.attack_alert_cooldown.as_secs()
    );

    let mut monitor = Monitor::new(ctx.client.clone(), ctx.alert_policy(), ctx.language);
    let (monitor_handle, monitor_signal) = stop_pair();
    let (view_handle, view_signal) = stop_pair();
    let _timer = stop_after(poll.duration, vec![monitor_handle, view_handle]);

    thread::scope(|s| {
        if with_view {
            let mut view = SimulationView::new(ctx.client.clone(), ctx.settings.clone(), ctx.language, true);
            s.spawn(move || run_loop(&mut view, interval, &view_signal));
        }
        run_loop(&mut monitor, interval, &monitor_signal);
    });

    let center = monitor.notifications_mut();
    info!(
        "Monitor stopped: {} notification(s), {} unread",
        center.all().len(),
        center.unread_count()
    );
    for n in center.all().iter().rev() {
        println!(
            "{} {} [{}] {} {}",
            if n.read { " " } else { "*" },
            n.timestamp.format("%H:%M:%S"),
            n.level,
            n.title,
            n.description.as_deref().unwrap_or("")
        );
    }
    center.mark_all_as_read();
    Ok(())
}

fn run_watch(ctx: &AppContext, view: WatchView, poll: PollArgs) -> Result<(), String> {
    let interval = ctx.refresh_interval(poll.interval_ms);
    let (handle, signal) = stop_pair();
    let _timer = stop_after(poll.duration, vec![handle]);
    info!("Watching {:?} every {}ms", view, interval.as_millis());
    let ticks = match view {
        WatchView::Simulation => {
            let mut target = SimulationView::new(ctx.client.clone(), ctx.settings.clone(), ctx.language, true);
            run_loop(&mut target, interval, &signal)
        }
        WatchView::Dashboard => {
            let mut target = DashboardView::new(ctx.client.clone(), ctx.settings.clone(), ctx.language, true);
            run_loop(&mut target, interval, &signal)
        }
    };
    info!("Watch finished after {} tick(s)", ticks);
    Ok(())
}

fn run_backend_config(ctx: &AppContext, action: BackendConfigCommands) -> Result<(), String> {
    let cfg = match action {
        BackendConfigCommands::Show => ctx.client.get_backend_config().map_err(|e| ctx.api_error(e))?,
        BackendConfigCommands::Set {
            valid_ips,
            log_interval,
            simulation_sleep,
        } => {
            ctx.require_session()?;
            if log_interval == Some(0) {
                return Err("log interval must be at least 1 second".into());
            }
            if simulation_sleep.is_some_and(|s| !s.is_finite() || s <= 0.0) {
                return Err("simulation sleep must be a positive number of seconds".into());
            }
            let update = BackendConfigUpdate {
                valid_ips: valid_ips.map(|ips| {
                    ips.into_iter()
                        .map(|ip| ip.trim().to_string())
                        .filter(|ip| !ip.is_empty())
                        .collect()
                }),
                log_interval,
                simulation_sleep,
            };
            if update.is_empty() {
                return Err("nothing to change; pass --valid-ips, --log-interval or --simulation-sleep".into());
            }
            ctx.client.update_backend_config(&update).map_err(|e| ctx.api_error(e))?
        }
    };
    let ips = if cfg.valid_ips.is_empty() {
        "(any)".to_string()
    } else {
        cfg.valid_ips.join(", ")
    };
    println!("valid_ips:        {}", ips);
    println!("log_interval:     {}s", cfg.log_interval);
    println!("simulation_sleep: {}s", cfg.simulation_sleep);
    Ok(())
}

fn run_users(ctx: &AppContext, action: UsersCommands) -> Result<(), String> {
    let mut auth = ctx.auth();
    match action {
        UsersCommands::List => {
            for user in auth.users().map_err(|e| ctx.auth_error(e))? {
                print_user(&user);
            }
        }
        UsersCommands::Promote { user_id, role } => {
            let user = auth.promote(&UserId(user_id), role).map_err(|e| ctx.auth_error(e))?;
            print_user(&user);
        }
        UsersCommands::Delete { user_id } => {
            let logged_out = auth.delete(&UserId(user_id.clone())).map_err(|e| ctx.auth_error(e))?;
            println!("Deleted user {}", user_id);
            if logged_out {
                println!("You deleted your own account and were logged out");
            }
        }
    }
    Ok(())
}

fn run_settings(ctx: &mut AppContext, action: SettingsCommands) -> Result<(), String> {
    match action {
        SettingsCommands::Show => {
            let body = serde_json::to_string_pretty(&ctx.settings).map_err(|e| e.to_string())?;
            println!("{}", body);
            if let Some(env) = ctx.config.refresh_interval {
                warn!("REFRESH_INTERVAL_MS={} overrides the stored interval", env.as_millis());
            }
            return Ok(());
        }
        SettingsCommands::Interval { ms } => ctx.settings.set_refresh_interval_ms(ms)?,
        SettingsCommands::Move {
            page,
            system_id,
            direction,
        } => {
            let page = match page {
                PageArg::Dashboard => Page::Dashboard,
                PageArg::Simulation => Page::Simulation,
            };
            let direction = match direction {
                DirectionArg::Up => Direction::Up,
                DirectionArg::Down => Direction::Down,
            };
            if !ctx.settings.move_system(page, &SystemId(system_id.clone()), direction) {
                println!("{} not moved (unknown id or already at the edge)", system_id);
                return Ok(());
            }
        }
        SettingsCommands::Toggle { system_id } => {
            let hidden = ctx.settings.toggle_visibility(&SystemId(system_id.clone()));
            println!("{} is now {}", system_id, if hidden { "hidden" } else { "visible" });
        }
        SettingsCommands::Theme { theme } => {
            let next = theme.unwrap_or(ctx.settings.theme.toggled());
            ctx.settings.theme = next;
            println!("theme: {}", ctx.settings.theme);
        }
        SettingsCommands::Language { language } => {
            ctx.settings.language = language;
            ctx.language = language;
        }
        SettingsCommands::Reset => {
            ctx.settings = ctx.settings_store.reset().map_err(|e| e.to_string())?;
            println!("settings reset to defaults");
            return Ok(());
        }
    }
    ctx.save_settings()
}
