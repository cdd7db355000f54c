//! Coverage for config parsing and path resolution.

use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use confann::config::{config_dir, load_config, Config, ConfPaths, ConfigError};

#[test]
fn defaults_match_the_public_network() {
    let config = Config::default();
    assert_eq!(config.irc.server, "tilde.chat");
    assert_eq!(config.irc.port, 6697);
    assert!(config.irc.tls);
    assert_eq!(config.irc.nick, "confann");
    assert_eq!(config.irc.channel, "#alrs");
    assert_eq!(config.irc.pre_join, vec!["#bots".to_owned()]);
    assert_eq!(config.irc.recovery_service, "NickServ");
    assert_eq!(config.irc.server_string(), "tilde.chat:6697");
    assert_eq!(
        config.webhook.listen_addr(),
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080)
    );
    assert_eq!(config.webhook.path, "/");
    assert_eq!(config.webhook.shutdown_grace(), Duration::from_secs(1));
}

#[test]
fn pre_join_channels_come_first() {
    let config = Config::default();
    assert_eq!(
        config.irc.join_order(),
        vec!["#bots".to_owned(), "#alrs".to_owned()]
    );
}

#[test]
fn parse_partial_config() {
    let toml_str = r##"
[irc]
server = "irc.example.net"
tls = false
channel = "#conf"
pre_join = []

[webhook]
port = 9090
path = "/join"
"##;
    let parsed = toml::from_str::<Config>(toml_str);
    assert!(parsed.is_ok());
    let config = match parsed {
        Ok(config) => config,
        Err(err) => panic!("partial config should parse: {err}"),
    };
    assert_eq!(config.irc.server, "irc.example.net");
    assert!(!config.irc.tls);
    assert_eq!(config.irc.port, 6697);
    assert_eq!(config.irc.join_order(), vec!["#conf".to_owned()]);
    assert_eq!(config.webhook.port, 9090);
    assert_eq!(config.webhook.path, "/join");
    assert!(config.validate().is_ok());
}

#[test]
fn missing_file_yields_defaults() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let loaded = load_config(&tmp.path().join("config.toml"));
    assert!(loaded.is_ok());
    let config = match loaded {
        Ok(config) => config,
        Err(err) => panic!("missing config should fall back to defaults: {err}"),
    };
    assert_eq!(config.irc.channel, "#alrs");
}

#[test]
fn malformed_file_is_a_parse_error() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let path = tmp.path().join("config.toml");
    let write = fs::write(&path, "[irc\nserver = ");
    assert!(write.is_ok());
    assert!(matches!(load_config(&path), Err(ConfigError::Parse { .. })));
}

#[test]
fn non_channel_names_fail_validation() {
    let mut config = Config::default();
    config.irc.channel = "alrs".to_owned();
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
fn conf_paths_layout() {
    let paths = ConfPaths::under("/srv/confann");
    assert!(paths.passwd.ends_with("passwd"));
    assert!(paths.recovery_secret.ends_with("nickserv.secret"));
    assert!(paths.config_toml.ends_with("config.toml"));
    assert!(paths.logs_dir.ends_with("logs"));
    assert!(paths.passwd.starts_with("/srv/confann"));
}

#[test]
fn config_dir_resolves() {
    let dir = config_dir();
    assert!(dir.is_ok());
    let path = match dir {
        Ok(path) => path,
        Err(err) => panic!("config dir should resolve: {err}"),
    };
    assert!(path.ends_with(".confann"));
}
