use clap::Parser;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use crossterm::event::{
    DisableMouseCapture, EnableMouseCapture, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use packbench::catalog::{self, QUERY_PACK};
use packbench::engine::{EngineProvider, PolarsBoot};
use packbench::fetch::{DefaultFetcher, Fetcher};
use packbench::widgets::results::dataframe_to_json;
use packbench::workbench::{PendingOp, WorkbenchSettings};
use packbench::{
    App, AppConfig, AppEvent, Args, CacheManager, ConfigManager, Mode, Theme, Workbench, APP_NAME,
};
use ratatui::DefaultTerminal;
use std::io::stdout;
use std::sync::mpsc::channel;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn render(terminal: &mut DefaultTerminal, app: &mut App) -> Result<()> {
    terminal.draw(|frame| frame.render_widget(app, frame.area()))?;
    Ok(())
}

fn run(mut terminal: DefaultTerminal, mut app: App, load_on_start: bool, poll: Duration) -> Result<()> {
    let (tx, rx) = channel::<AppEvent>();
    let size = terminal.size()?;
    tx.send(AppEvent::Resize(size.width, size.height))?;
    if load_on_start {
        app.workbench().prepare(PendingOp::Load);
        tx.send(AppEvent::DoLoadDataset)?;
    }
    render(&mut terminal, &mut app)?;

    loop {
        if crossterm::event::poll(poll)? {
            match crossterm::event::read()? {
                crossterm::event::Event::Key(key)
                    if key.kind != crossterm::event::KeyEventKind::Release =>
                {
                    tx.send(AppEvent::Key(key))?
                }
                crossterm::event::Event::Mouse(mouse) => tx.send(AppEvent::Mouse(mouse))?,
                crossterm::event::Event::Resize(cols, rows) => {
                    tx.send(AppEvent::Resize(cols, rows))?
                }
                _ => {}
            }
        }

        let updated = match rx.recv_timeout(Duration::from_millis(0)) {
            Ok(event) => {
                match event {
                    AppEvent::Exit => break,
                    AppEvent::Crash(msg) => {
                        return Err(eyre!(msg));
                    }
                    event => {
                        if let Some(event) = app.event(&event) {
                            tx.send(event)?;
                        }
                    }
                }
                true
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => false,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        };

        if updated {
            render(&mut terminal, &mut app)?;
        }
    }
    Ok(())
}

/// Install a file subscriber when `--log-file` or `--debug` asks for one.
/// The terminal belongs to the UI, so logs never go to stdout or stderr.
fn init_logging(args: &Args) -> Result<()> {
    let path = match (&args.log_file, args.debug) {
        (Some(path), _) => path.clone(),
        (None, true) => {
            let cache = CacheManager::new(APP_NAME)?;
            cache.ensure_cache_dir()?;
            cache.cache_file("packbench.log")
        }
        (None, false) => return Ok(()),
    };
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| eyre!("Could not open log file {}: {}", path.display(), e))?;
    let default_level = if args.debug { "packbench=debug" } else { "packbench=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .with(
            EnvFilter::try_from_env("PACKBENCH_LOG")
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .try_init()
        .map_err(|e| eyre!("Could not install logger: {}", e))?;
    Ok(())
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = AppConfig::load(APP_NAME)?;
    config.apply_args(args);
    config.validate()?;
    Ok(config)
}

fn build_workbench(config: &AppConfig, mode: Mode) -> Workbench {
    let fetcher: Arc<dyn Fetcher> = Arc::new(DefaultFetcher::new(config.timeouts.http()));
    let cache = CacheManager::new(APP_NAME).ok();
    let boot = PolarsBoot::new(Arc::clone(&fetcher), cache, config.engine.streaming);
    Workbench::new(
        Arc::new(EngineProvider::new(Arc::new(boot))),
        fetcher,
        WorkbenchSettings::from_config(config),
        mode,
        catalog::active_queries(QUERY_PACK, mode),
    )
}

fn session_mode(args: &Args, config: &AppConfig) -> Mode {
    catalog::resolve_mode(args.mode, config.workbench.configured_mode())
}

/// Load the pack, run one catalog query and print it as JSON.
fn run_headless(args: &Args, config: &AppConfig, query_id: &str) -> Result<()> {
    let mode = session_mode(args, config);
    let workbench = build_workbench(config, mode);
    let query = catalog::find_by_id(workbench.active_queries(), query_id).ok_or_else(|| {
        eyre!(
            "No query with id '{}' in {} mode (see --list-queries)",
            query_id,
            mode
        )
    })?;
    let manifest = workbench.load_dataset()?;
    eprintln!("{}", workbench.status().text);
    tracing::info!(pack = %manifest.pack_name, query = query.id, "headless run");
    match workbench.apply_query(query, true)? {
        Some(result) => {
            println!("{}", dataframe_to_json(&result.df)?);
            eprintln!("{}", workbench.status().text);
        }
        None => eprintln!("Query {} has no SQL", query.id),
    }
    Ok(())
}

fn handle_early_exit_flags(args: &Args) -> Result<Option<()>> {
    if args.clear_cache {
        match CacheManager::new(APP_NAME) {
            Ok(cache) => {
                if let Err(e) = cache.clear_all() {
                    eprintln!("Error clearing cache: {}", e);
                    std::process::exit(1);
                }
                println!("Cache cleared successfully");
            }
            Err(_e) => println!("No cache to clear"),
        }
        return Ok(Some(()));
    }

    if args.generate_config {
        let manager = ConfigManager::new(APP_NAME)?;
        match manager.write_default_config(args.force) {
            Ok(path) => println!("Wrote default configuration to {}", path.display()),
            Err(e) => {
                eprintln!("Error generating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(Some(()));
    }

    if args.list_queries {
        let config = load_config(args)?;
        let mode = session_mode(args, &config);
        for query in catalog::active_queries(QUERY_PACK, mode) {
            let hotkey = query
                .hotkey
                .map(|k| format!("Alt+{}", k))
                .unwrap_or_default();
            println!(
                "{:<36} {:<8} {:<12} {}",
                query.id,
                hotkey,
                query.group.label(),
                query.title
            );
        }
        return Ok(Some(()));
    }

    Ok(None)
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(()) = handle_early_exit_flags(&args)? {
        return Ok(());
    }

    color_eyre::install()?;
    init_logging(&args)?;
    let config = load_config(&args)?;

    if let Some(query_id) = &args.run {
        return run_headless(&args, &config, query_id);
    }

    let theme = Theme::from_config(&config.theme)?;
    let mode = session_mode(&args, &config);
    let workbench = Arc::new(build_workbench(&config, mode));
    let mut app = App::new(workbench, &config, &theme);
    if config.debug.enabled {
        app.enable_debug();
    }
    tracing::info!(mode = %mode, base_url = %config.workbench.base_url, "starting workbench");

    let terminal = ratatui::init();
    crossterm::execute!(stdout(), EnableMouseCapture)?;
    // Lets Shift+Enter and Ctrl+Enter through on terminals that support it
    let enhanced = crossterm::terminal::supports_keyboard_enhancement().unwrap_or(false)
        && crossterm::execute!(
            stdout(),
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES)
        )
        .is_ok();

    let poll = Duration::from_millis(config.performance.event_poll_interval_ms);
    let result = run(terminal, app, args.load, poll);

    if enhanced {
        let _ = crossterm::execute!(stdout(), PopKeyboardEnhancementFlags);
    }
    let _ = crossterm::execute!(stdout(), DisableMouseCapture);
    ratatui::restore();
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
