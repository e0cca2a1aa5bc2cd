use super::*;
use std::io::Write;

#[test]
fn test_defaults_are_valid() {
    let config = DeskbookConfig::default();
    config.validate().unwrap();
    assert_eq!(config.site.offset().unwrap().local_minus_utc(), 19_800);
    assert_eq!(config.booking.non_working_day().unwrap(), Weekday::Sun);
    assert_eq!(config.booking.short_day().unwrap(), Weekday::Sat);
    assert!(config.booking.skip_non_working_day);
}

#[test]
fn test_missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = DeskbookConfig::load_from(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.platform.default_city, "bangalore");
    assert_eq!(config.reminders.hour, 9);
}

#[test]
fn test_partial_file_keeps_other_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        "[booking]\nweekday_start = \"08:30\"\nnon_working_day = \"Sat\"\n\n[reminders]\nnotification_permission = \"denied\""
    )
    .unwrap();

    let config = DeskbookConfig::load_from(&path).unwrap();
    assert_eq!(config.booking.weekday_start, "08:30");
    assert_eq!(config.booking.weekday_end, "18:00");
    assert_eq!(config.booking.non_working_day().unwrap(), Weekday::Sat);
    assert_eq!(
        config.reminders.notification_permission,
        NotificationPermission::Denied
    );
    assert_eq!(config.platform.api_base, "https://members.wework.com");
}

#[test]
fn test_invalid_values_are_rejected_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[site]\nutc_offset = \"IST\"\n").unwrap();

    let err = DeskbookConfig::load_from(&path).unwrap_err();
    assert!(format!("{err:#}").contains("utc offset"));
}

#[test]
fn test_template_parses_to_defaults() {
    let config: DeskbookConfig = toml::from_str(&DeskbookConfig::default_template()).unwrap();
    config.validate().unwrap();
    assert_eq!(config.location.space_id, "147");
}

#[test]
fn test_write_template_does_not_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    assert!(DeskbookConfig::write_template(&path).unwrap());
    std::fs::write(&path, "# mine\n").unwrap();
    assert!(!DeskbookConfig::write_template(&path).unwrap());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "# mine\n");
}

#[test]
fn test_default_headers_carry_platform_origin() {
    let platform = PlatformConfig::default();
    let headers = platform.default_headers();
    let lookup = |name: &str| {
        headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    };
    assert_eq!(lookup("origin"), Some("https://members.wework.com"));
    assert_eq!(
        lookup("referer"),
        Some("https://members.wework.com/workplaceone/content2/bookings/desks")
    );
    assert_eq!(lookup("request-source"), Some("MemberWeb/WorkplaceOne/Prod"));
    assert!(lookup("authorization").is_none());
}

#[test]
fn test_default_location_has_booking_ids() {
    let location = DeskbookConfig::default().default_location();
    assert!(!location.location_id.is_empty());
    assert!(!location.space_id.is_empty());
    assert_eq!(location.mail_data.location_state, "KA");
}

#[test]
fn test_state_file_override() {
    let mut config = DeskbookConfig::default();
    config.storage.state_file = Some(PathBuf::from("/tmp/custom-state.json"));
    assert_eq!(config.state_file(), PathBuf::from("/tmp/custom-state.json"));
}
