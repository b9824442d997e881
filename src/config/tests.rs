use super::*;

#[test]
fn defaults_match_documented_values() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr, "127.0.0.1:8080".parse::<SocketAddr>().expect("addr"));
    assert_eq!(settings.server.graceful_shutdown, Duration::from_secs(10));
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert_eq!(settings.content.root, PathBuf::from("md"));
    assert_eq!(settings.content.extension, ".md");
    assert_eq!(settings.content.cache_capacity.get(), 128);
    assert_eq!(settings.content.index_title, "index");
    assert_eq!(settings.site.brand, "ink");
    assert!(settings.site.author.is_empty());
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());
    raw.content.cache_capacity = Some(16);

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        cache_capacity: Some(32),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.content.cache_capacity.get(), 32);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn extension_is_normalized_to_a_leading_dot() {
    let mut raw = RawSettings::default();
    raw.content.extension = Some("markdown".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.content.extension, ".markdown");

    assert_eq!(normalize_extension(" .md "), Some(".md".to_string()));
    assert_eq!(normalize_extension("."), None);
}

#[test]
fn zero_values_are_rejected() {
    let mut raw = RawSettings::default();
    raw.content.cache_capacity = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero capacity");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "content.cache_capacity",
            ..
        }
    ));

    let mut raw = RawSettings::default();
    raw.server.port = Some(0);
    assert!(Settings::from_raw(raw).is_err());

    let mut raw = RawSettings::default();
    raw.server.graceful_shutdown_seconds = Some(0);
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn blank_content_values_are_rejected() {
    let mut raw = RawSettings::default();
    raw.content.index_title = Some("  ".to_string());
    assert!(Settings::from_raw(raw).is_err());

    let mut raw = RawSettings::default();
    raw.content.extension = Some(String::new());
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn blank_site_brand_is_rejected() {
    let mut raw = RawSettings::default();
    raw.site.brand = Some(" ".to_string());
    let err = Settings::from_raw(raw).expect_err("blank brand");
    assert!(matches!(err, LoadError::Invalid { key: "site.brand", .. }));
}

#[test]
fn invalid_log_level_is_rejected() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("chatty".to_string());
    let err = Settings::from_raw(raw).expect_err("bad level");
    assert!(err.to_string().contains("logging.level"));
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["ink"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "ink",
        "--config-file",
        "/etc/ink.toml",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--content-root",
        "/srv/notes",
        "--content-extension",
        "markdown",
        "--log-json",
        "yes",
    ]);

    assert_eq!(
        args.config_file.as_deref(),
        Some(std::path::Path::new("/etc/ink.toml"))
    );
    let Some(Command::Serve(serve)) = args.command else {
        panic!("serve command expected");
    };
    assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
    assert_eq!(
        serve.overrides.content_root.as_deref(),
        Some(std::path::Path::new("/srv/notes"))
    );
    assert_eq!(serve.overrides.content_extension.as_deref(), Some("markdown"));
    assert_eq!(serve.overrides.log_json, Some(true));
}

#[test]
fn config_file_sections_are_read() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("ink.toml");
    std::fs::write(
        &path,
        "[server]\nport = 9090\n\n[content]\nroot = \"notes\"\ncache_capacity = 4\n\n\
         [site]\nauthor = \"Ada\"\nbrand = \"Notebook\"\nsince = \"2019\"\n",
    )
    .expect("write config");

    let args = CliArgs::parse_from([
        "ink",
        "--config-file",
        path.to_str().expect("utf-8 path"),
    ]);
    let settings = load(&args).expect("settings load");

    assert_eq!(settings.server.addr.port(), 9090);
    assert_eq!(settings.content.root, PathBuf::from("notes"));
    assert_eq!(settings.content.cache_capacity.get(), 4);
    assert_eq!(settings.site.author, "Ada");
    assert_eq!(settings.site.brand, "Notebook");
    assert_eq!(settings.site.since, "2019");
    assert!(settings.site.github.is_empty());
}
