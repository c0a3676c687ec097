// Native binary for d2x - terminal page, or a plain-text dump with --print

use anyhow::{Context, Result};
use crossterm::{
    event::{
        self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent,
        KeyEventKind, KeyModifiers,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    io,
    time::{Duration, Instant},
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use d2x::{
    app::{App, InputMode},
    bungie_api::BungieClient,
    callback,
    config::{self, Config},
    oauth::{self, complete_flow, OAuthClient},
    storage::Store,
    tasks::{self, Services},
    types::{err_string, AppEvent, Command},
    ui, view,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (safe to ignore if not found)
    let _ = dotenvy::dotenv();

    let cfg = config::load().context("Failed to load configuration")?;
    init_logging(cfg.print);

    if cfg.authorize_url {
        return print_authorize_url(&cfg);
    }

    let store = Store::open(&cfg.db_path)
        .with_context(|| format!("Failed to open cache at {}", cfg.db_path))?;
    let services = Services {
        anon: BungieClient::anonymous(
            cfg.api_base.clone(),
            cfg.app_info.api_key.clone(),
            cfg.timeout_ms,
            cfg.retries,
        ),
        oauth: cfg.app_info.client_id().map(|id| {
            OAuthClient::new(
                cfg.api_base.clone(),
                id,
                cfg.app_info.client_secret.clone(),
                cfg.timeout_ms,
                cfg.retries,
            )
        }),
        store,
        application_id: cfg.application_id,
    };

    // app + channels
    let (tx, rx) = unbounded_channel::<AppEvent>();
    let (cmd_tx, cmd_rx) = unbounded_channel::<Command>();

    // a redirect URL handed over on the command line is exchanged before anything else
    if let Some(url) = &cfg.callback_url {
        let res = exchange_cli_callback(&services, url).await;
        match &res {
            Ok(token) => log::info!("[auth] authorized Bungie.net user {}", token.membership_id),
            Err(e) => log::error!("[auth] {e:#}"),
        }
        let _ = tx.send(AppEvent::OAuthCompleted(res.map_err(err_string)));
    }

    let mut app = App::new(
        cfg.render_fps,
        cfg.theme,
        cfg.api_base.clone(),
        cfg.app_info.clone(),
        Some(cmd_tx),
    );

    let mut handles = tasks::spawn_startup(&services, &cfg.manifest_lang, &cfg.tables, &tx);
    {
        let services = services.clone();
        let tx = tx.clone();
        handles.push(tokio::spawn(tasks::run_commands(services, cmd_rx, tx)));
    }

    if cfg.print {
        cfg.print_summary();
        let res = run_print(&mut app, rx, cfg.print_timeout_ms).await;
        for h in handles {
            h.abort();
        }
        return res;
    }

    // the redirect listener only makes sense while the page is open
    let listener = if cfg.callback_port != 0 && services.oauth.is_some() {
        match callback::start(cfg.callback_port, tx.clone()).await {
            Ok(l) => {
                app.set_redirect_url(l.redirect_url());
                Some(l)
            }
            Err(e) => {
                log::warn!("[callback] {e:#}");
                let _ = tx.send(AppEvent::Log(format!("OAuth listener unavailable: {e:#}")));
                None
            }
        }
    } else {
        None
    };

    // terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    // main loop
    let res = run_loop(&mut app, &mut terminal, rx, tx).await;

    // cleanup
    for h in handles {
        h.abort();
    }
    if let Some(l) = listener {
        l.abort();
    }
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableBracketedPaste, LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    res
}

/// stderr for --print; the TUI owns the terminal, so there logs go to
/// D2X_LOG_FILE or nowhere
fn init_logging(print: bool) {
    let env = env_logger::Env::default().default_filter_or("info");
    if print {
        env_logger::Builder::from_env(env).init();
        return;
    }
    let Ok(path) = std::env::var("D2X_LOG_FILE") else {
        return;
    };
    match std::fs::OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => {
            env_logger::Builder::from_env(env)
                .target(env_logger::Target::Pipe(Box::new(file)))
                .init();
        }
        Err(e) => eprintln!("Warning: cannot open log file {path}: {e}"),
    }
}

fn print_authorize_url(cfg: &Config) -> Result<()> {
    let client_id = cfg
        .app_info
        .client_id()
        .context("BUNGIE_CLIENT_ID is required for --authorize-url")?;
    let state = oauth::new_state();
    println!("{}", oauth::authorize_url(&cfg.api_base, client_id, &state));
    eprintln!("state: {state}");
    eprintln!("after authorizing, run again with --callback-url '<the URL you were redirected to>'");
    Ok(())
}

/// The state from an earlier --authorize-url run isn't known here, so any
/// state is accepted
async fn exchange_cli_callback(services: &Services, url: &str) -> Result<oauth::TokenSet> {
    let oauth = services
        .oauth
        .as_ref()
        .context("BUNGIE_CLIENT_ID is required for --callback-url")?;
    let params = oauth::parse_callback(url)?;
    complete_flow(oauth, &services.store, &params, None).await
}

async fn run_print(
    app: &mut App,
    mut rx: UnboundedReceiver<AppEvent>,
    timeout_ms: u64,
) -> Result<()> {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    while !app.is_settled() {
        tokio::select! {
            ev = rx.recv() => match ev {
                Some(ev) => app.on_event(ev),
                None => break,
            },
            _ = tokio::time::sleep_until(deadline) => {
                log::warn!("[print] gave up waiting after {timeout_ms}ms");
                break;
            }
        }
    }
    print!("{}", view::to_plain(&view::page(app)));
    Ok(())
}

async fn run_loop(
    app: &mut App,
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut rx: UnboundedReceiver<AppEvent>,
    tx: UnboundedSender<AppEvent>,
) -> Result<()> {
    let mut last_frame = Instant::now();

    loop {
        // frame budget (coalesced renders)
        let frame_ms = 1000u32.saturating_div(app.fps().max(1)) as u64;
        let budget = Duration::from_millis(frame_ms.max(1));
        let wait = budget.saturating_sub(last_frame.elapsed());

        // input or task events
        if event::poll(wait)? {
            match event::read()? {
                Event::Key(k) => {
                    if k.kind == KeyEventKind::Press || k.kind == KeyEventKind::Repeat {
                        handle_key(app, k, &tx);
                    }
                }
                Event::Paste(text) => {
                    if app.input_mode() == InputMode::PasteCallback {
                        text.chars()
                            .filter(|c| !c.is_control())
                            .for_each(|c| app.paste_add_char(c));
                    }
                }
                _ => {}
            }
        }
        while let Ok(ev) = rx.try_recv() {
            app.on_event(ev);
        }

        if last_frame.elapsed() >= budget {
            terminal.draw(|f| ui::draw(f, app))?;
            last_frame = Instant::now();
        }
        if app.quit_flag() {
            break;
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, k: KeyEvent, tx: &UnboundedSender<AppEvent>) {
    let ctrl = k.modifiers.contains(KeyModifiers::CONTROL);

    if app.input_mode() == InputMode::PasteCallback {
        match k.code {
            KeyCode::Esc => app.cancel_paste(),
            KeyCode::Enter => app.submit_paste(),
            KeyCode::Backspace => app.paste_backspace(),
            KeyCode::Char('c') if ctrl => app.cancel_paste(),
            KeyCode::Char(c) if !ctrl => app.paste_add_char(c),
            _ => {}
        }
        return;
    }

    match k.code {
        KeyCode::Char('c') if ctrl => {
            let _ = tx.send(AppEvent::Quit);
        }
        KeyCode::Char('d') if ctrl => app.toggle_debug_panel(),
        KeyCode::Char('q') => {
            let _ = tx.send(AppEvent::Quit);
        }
        KeyCode::Char('r') => app.reroll(),
        KeyCode::Char('o') => {
            app.restart_oauth();
            if let Some(url) = app.authorize_url().map(str::to_string) {
                app.log_debug(format!("authorize: {url}"));
            }
        }
        KeyCode::Char('p') => app.start_paste(),
        KeyCode::Up | KeyCode::Char('k') => app.scroll_up(1),
        KeyCode::Down | KeyCode::Char('j') => app.scroll_down(1),
        KeyCode::PageUp => app.scroll_up(10),
        KeyCode::PageDown | KeyCode::Char(' ') => app.scroll_down(10),
        KeyCode::Home | KeyCode::Char('g') => app.scroll_home(),
        _ => {}
    }
}
