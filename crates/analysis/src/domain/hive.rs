#![forbid(unsafe_code)]

/// The registry hives taint resolution inspects. Each hive file may be
/// accompanied by up to two rotating transaction logs, so up to 18 source
/// files are considered in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HiveKind {
    System,
    Sam,
    Software,
    Security,
    Default,
    NtUser,
}

impl HiveKind {
    pub const ALL: [HiveKind; 6] = [
        HiveKind::System,
        HiveKind::Sam,
        HiveKind::Software,
        HiveKind::Security,
        HiveKind::Default,
        HiveKind::NtUser,
    ];

    /// Guest path of the hive file itself.
    pub fn guest_path(self) -> &'static str {
        match self {
            HiveKind::System => "C:\\Windows\\System32\\config\\SYSTEM",
            HiveKind::Sam => "C:\\Windows\\System32\\config\\SAM",
            HiveKind::Software => "C:\\Windows\\System32\\config\\SOFTWARE",
            HiveKind::Security => "C:\\Windows\\System32\\config\\SECURITY",
            HiveKind::Default => "C:\\Windows\\System32\\config\\DEFAULT",
            HiveKind::NtUser => "C:\\Users\\Administrator\\NTUSER.DAT",
        }
    }

    /// The rotating transaction logs kept beside the hive.
    pub fn log_paths(self) -> [String; 2] {
        let base = self.guest_path();
        [format!("{base}.LOG1"), format!("{base}.LOG2")]
    }
}
