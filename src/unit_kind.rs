//! The fixed directive-grammar tables systemd itself defines per unit kind.
//! These are data, not behavior: `UnitKind::from_suffix` dispatches on a
//! filename suffix, and `UnitKind::option_groups` returns the list of
//! directive-name tables that are legal for that kind (systemd.unit(5) and
//! friends).

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Target,
    Device,
    Service,
    Slice,
    Socket,
    Mount,
    Automount,
    Swap,
    Path,
    Timer,
    Scope,
    Conf,
}

impl Default for UnitKind {
    fn default() -> Self {
        Self::Target
    }
}

impl UnitKind {
    /// Dispatch on a unit file's suffix. Per the original tool's behavior,
    /// an unrecognized suffix falls back to `Target` rather than erroring.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Some(match suffix {
            "target" => Self::Target,
            "device" => Self::Device,
            "service" => Self::Service,
            "slice" => Self::Slice,
            "socket" => Self::Socket,
            "mount" => Self::Mount,
            "automount" => Self::Automount,
            "swap" => Self::Swap,
            "path" => Self::Path,
            "timer" => Self::Timer,
            "scope" => Self::Scope,
            "conf" => Self::Conf,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Target => "target",
            Self::Device => "device",
            Self::Service => "service",
            Self::Slice => "slice",
            Self::Socket => "socket",
            Self::Mount => "mount",
            Self::Automount => "automount",
            Self::Swap => "swap",
            Self::Path => "path",
            Self::Timer => "timer",
            Self::Scope => "scope",
            Self::Conf => "conf",
        }
    }

    /// The directive-name tables this kind draws from, consulted in order
    /// by [`crate::unit_file::check_option`].
    pub fn option_groups(&self) -> &'static [&'static [&'static str]] {
        match self {
            Self::Target | Self::Device => &[UNIT_GENERIC_OPTS, UNIT_COND_ASSERT_OPTS, UNIT_INSTALL_OPTS],
            Self::Slice => &[
                UNIT_GENERIC_OPTS,
                UNIT_COND_ASSERT_OPTS,
                UNIT_INSTALL_OPTS,
                RES_CON_UNIT_OPTS,
            ],
            Self::Service => &[
                UNIT_GENERIC_OPTS,
                UNIT_COND_ASSERT_OPTS,
                UNIT_INSTALL_OPTS,
                SERV_UNIT_OPTS,
                EXEC_UNIT_OPTS,
                RES_CON_UNIT_OPTS,
                KILL_UNIT_OPTS,
            ],
            Self::Socket => &[
                UNIT_GENERIC_OPTS,
                UNIT_COND_ASSERT_OPTS,
                UNIT_INSTALL_OPTS,
                SOCK_UNIT_OPTS,
                KILL_UNIT_OPTS,
                RES_CON_UNIT_OPTS,
                EXEC_UNIT_OPTS,
            ],
            Self::Mount => &[
                UNIT_GENERIC_OPTS,
                UNIT_COND_ASSERT_OPTS,
                UNIT_INSTALL_OPTS,
                MNT_UNIT_OPTS,
                KILL_UNIT_OPTS,
                RES_CON_UNIT_OPTS,
                EXEC_UNIT_OPTS,
            ],
            Self::Automount => &[UNIT_GENERIC_OPTS, UNIT_COND_ASSERT_OPTS, UNIT_INSTALL_OPTS, AUTOMNT_UNIT_OPTS],
            Self::Swap => &[
                UNIT_GENERIC_OPTS,
                UNIT_COND_ASSERT_OPTS,
                UNIT_INSTALL_OPTS,
                SWAP_UNIT_OPTS,
                KILL_UNIT_OPTS,
                RES_CON_UNIT_OPTS,
                EXEC_UNIT_OPTS,
            ],
            Self::Path => &[UNIT_GENERIC_OPTS, UNIT_COND_ASSERT_OPTS, UNIT_INSTALL_OPTS, PATH_UNIT_OPTS],
            Self::Timer => &[UNIT_GENERIC_OPTS, UNIT_COND_ASSERT_OPTS, UNIT_INSTALL_OPTS, TIMER_UNIT_OPTS],
            Self::Scope => &[
                UNIT_GENERIC_OPTS,
                UNIT_COND_ASSERT_OPTS,
                SCOPE_UNIT_OPTS,
                KILL_UNIT_OPTS,
                RES_CON_UNIT_OPTS,
                EXEC_UNIT_OPTS,
            ],
            Self::Conf => &[
                UNIT_GENERIC_OPTS,
                UNIT_COND_ASSERT_OPTS,
                UNIT_INSTALL_OPTS,
                SERV_UNIT_OPTS,
                RES_CON_UNIT_OPTS,
                EXEC_UNIT_OPTS,
            ],
        }
    }

    pub fn accepts(&self, directive: &str) -> bool {
        self.option_groups()
            .iter()
            .any(|group| group.contains(&directive))
    }
}

pub const UNIT_GENERIC_OPTS: &[&str] = &[
    "Description",
    "Documentation",
    "Before",
    "After",
    "Wants",
    "Conflicts",
    "Requires",
    "Requisite",
    "BindsTo",
    "PartOf",
    "Upholds",
    "OnSuccess",
    "OnFailure",
    "PropagatesReloadTo",
    "ReloadPropagatedFrom",
    "PropagatesStopTo",
    "StopPropagatedFrom",
    "JoinsNamespaceOf",
    "RequiresMountsFor",
    "OnFailureJobMode",
    "IgnoreOnIsolate",
    "StopWhenUnneeded",
    "RefuseManualStart",
    "RefuseManualStop",
    "AllowIsolate",
    "DefaultDependencies",
    "CollectMode",
    "FailureAction",
    "FailureActionExitStatus",
    "SuccessAction",
    "SuccessActionExitStatus",
    "JobTimeoutSec",
    "JobRunningTimeoutSec",
    "JobTimeoutAction",
    "JobTimeoutRebootArgument",
    "StartLimitIntervalSec",
    "StartLimitInterval",
    "StartLimitBurst",
    "StartLimitAction",
    "RebootArgument",
    "SourcePath",
];

pub const UNIT_COND_ASSERT_OPTS: &[&str] = &[
    "ConditionArchitecture",
    "ConditionFirmware",
    "ConditionVirtualization",
    "ConditionHost",
    "ConditionKernelCommandLine",
    "ConditionKernelVersion",
    "ConditionCredential",
    "ConditionEnvironment",
    "ConditionSecurity",
    "ConditionCapability",
    "ConditionACPower",
    "ConditionNeedsUpdate",
    "ConditionFirstBoot",
    "ConditionPathExists",
    "ConditionPathExistsGlob",
    "ConditionPathIsDirectory",
    "ConditionPathIsSymbolicLink",
    "ConditionPathIsMountPoint",
    "ConditionPathIsReadWrite",
    "ConditionPathIsEncrypted",
    "ConditionDirectoryNotEmpty",
    "ConditionFileNotEmpty",
    "ConditionFileIsExecutable",
    "ConditionUser",
    "ConditionGroup",
    "ConditionControlGroupController",
    "ConditionMemory",
    "ConditionCPUs",
    "ConditionCPUFeature",
    "ConditionOSRelease",
    "ConditionMemoryPressure",
    "ConditionCPUPressure",
    "ConditionIOPressure",
    "AssertArchitecture",
    "AssertVirtualization",
    "AssertHost",
    "AssertKernelCommandLine",
    "AssertKernelVersion",
    "AssertCredential",
    "AssertEnvironment",
    "AssertSecurity",
    "AssertCapability",
    "AssertACPower",
    "AssertNeedsUpdate",
    "AssertFirstBoot",
    "AssertPathExists",
    "AssertPathExistsGlob",
    "AssertPathIsDirectory",
    "AssertPathIsSymbolicLink",
    "AssertPathIsMountPoint",
    "AssertPathIsReadWrite",
    "AssertPathIsEncrypted",
    "AssertDirectoryNotEmpty",
    "AssertFileNotEmpty",
    "AssertFileIsExecutable",
    "AssertUser",
    "AssertGroup",
    "AssertControlGroupController",
    "AssertMemory",
    "AssertCPUs",
    "AssertCPUFeature",
    "AssertOSRelease",
    "AssertMemoryPressure",
    "AssertCPUPressure",
    "AssertIOPressure",
];

pub const UNIT_INSTALL_OPTS: &[&str] = &["Alias", "WantedBy", "RequiredBy", "Also", "DefaultInstance"];

pub const SERV_UNIT_OPTS: &[&str] = &[
    "Type",
    "ExitType",
    "RemainAfterExit",
    "GuessMainPID",
    "PIDFile",
    "BusName",
    "ExecStart",
    "ExecStartPre",
    "ExecStartPost",
    "ExecCondition",
    "ExecReload",
    "ExecStop",
    "ExecStopPost",
    "RestartSec",
    "TimeoutStartSec",
    "TimeoutStopSec",
    "TimeoutAbortSec",
    "TimeoutSec",
    "TimeoutStartFailureMode",
    "TimeoutStopFailureMode",
    "RuntimeMaxSec",
    "RuntimeRandomizedExtraSec",
    "WatchdogSec",
    "Restart",
    "SuccessExitStatus",
    "RestartPreventExitStatus",
    "RestartForceExitStatus",
    "PermissionsStartOnly",
    "RootDirectoryStartOnly",
    "NonBlocking",
    "NotifyAccess",
    "Sockets",
    "FileDescriptorStoreMax",
    "USBFunctionDescriptors",
    "USBFunctionStrings",
    "OOMPolicy",
    "OpenFile",
    "ReloadSignal",
];

pub const SOCK_UNIT_OPTS: &[&str] = &[
    "ListenStream",
    "ListenDatagram",
    "ListenSequentialPacket",
    "ListenFIFO",
    "ListenSpecial",
    "ListenNetlink",
    "ListenMessageQueue",
    "ListenUSBFunction",
    "SocketProtocol",
    "BindIPv6Only",
    "Backlog",
    "BindToDevice",
    "SocketUser",
    "SocketGroup",
    "SocketMode",
    "DirectoryMode",
    "Accept",
    "Writable",
    "FlushPending",
    "MaxConnections",
    "MaxConnectionsPerSource",
    "KeepAlive",
    "KeepAliveTimeSec",
    "KeepAliveIntervalSec",
    "KeepAliveProbes",
    "NoDelay",
    "Priority",
    "DeferAcceptSec",
    "ReceiveBuffer",
    "SendBuffer",
    "IPTOS",
    "IPTTL",
    "Mark",
    "ReusePort",
    "SmackLabel",
    "SmackLabelIPIn",
    "SmackLabelIPOut",
    "SELinuxContextFromNet",
    "PipeSize",
    "MessageQueueMaxMessages",
    "MessageQueueMessageSize",
    "FreeBind",
    "Transparent",
    "Broadcast",
    "PassCredentials",
    "PassSecurity",
    "PassPacketInfo",
    "Timestamping",
    "TCPCongestion",
    "ExecStartPre",
    "ExecStartPost",
    "ExecStopPre",
    "ExecStopPost",
    "TimeoutSec",
    "Service",
    "RemoveOnStop",
    "Symlinks",
    "FileDescriptorName",
    "TriggerLimitIntervalSec",
    "TriggerLimitBurst",
];

pub const MNT_UNIT_OPTS: &[&str] = &[
    "What",
    "Where",
    "Type",
    "Options",
    "SloppyOptions",
    "LazyUnmount",
    "ReadWriteOnly",
    "ForceUnmount",
    "DirectoryMode",
    "TimeoutSec",
];

pub const AUTOMNT_UNIT_OPTS: &[&str] = &["Where", "ExtraOptions", "DirectoryMode", "TimeoutIdleSec"];

pub const SWAP_UNIT_OPTS: &[&str] = &["What", "Priority", "Options", "TimeoutSec"];

pub const PATH_UNIT_OPTS: &[&str] = &[
    "PathExists",
    "PathExistsGlob",
    "PathChanged",
    "PathModified",
    "DirectoryNotEmpty",
    "Unit",
    "MakeDirectory",
    "DirectoryMode",
    "TriggerLimitIntervalSec",
    "TriggerLimitBurst",
];

pub const TIMER_UNIT_OPTS: &[&str] = &[
    "OnActiveSec",
    "OnBootSec",
    "OnStartupSec",
    "OnUnitActiveSec",
    "OnUnitInactiveSec",
    "OnCalendar",
    "AccuracySec",
    "RandomizedDelaySec",
    "FixedRandomDelay",
    "OnClockChange",
    "OnTimezoneChange",
    "Unit",
    "Persistent",
    "WakeSystem",
    "RemainAfterElapse",
];

pub const SCOPE_UNIT_OPTS: &[&str] = &["OOMPolicy", "RuntimeMaxSec", "RuntimeRandomizedExtraSec"];

pub const KILL_UNIT_OPTS: &[&str] = &[
    "KillMode",
    "KillSignal",
    "RestartKillSignal",
    "SendSIGHUP",
    "SendSIGKILL",
    "FinalKillSignal",
    "WatchdogSignal",
];

pub const RES_CON_UNIT_OPTS: &[&str] = &[
    "CPUAccounting",
    "CPUWeight",
    "StartupCPUWeight",
    "CPUQuota",
    "CPUQuotaPeriodSec",
    "AllowedCPUs",
    "StartupAllowedCPUs",
    "AllowedMemoryNodes",
    "StartupAllowedMemoryNodes",
    "MemoryAccounting",
    "MemoryMin",
    "MemoryLow",
    "MemoryHigh",
    "MemoryMax",
    "MemorySwapMax",
    "MemoryZSwapMax",
    "TasksAccounting",
    "TasksMax",
    "IOAccounting",
    "IOWeight",
    "StartupIOWeight",
    "IODeviceWeight",
    "IOReadBandwidthMax",
    "IOWriteBandwidthMax",
    "IOReadIOPSMax",
    "IOWriteIOPSMax",
    "IODeviceLatencyTargetSec",
    "IPAccounting",
    "IPAddressAllow",
    "IPAddressDeny",
    "IPIngressFilterPath",
    "IPEgressFilterPath",
    "BPFProgram",
    "SocketBindAllow",
    "SocketBindDeny",
    "RestrictNetworkInterfaces",
    "DeviceAllow",
    "DevicePolicy",
    "Slice",
    "Delegate",
    "DisableControllers",
    "ManagedOOMSwap",
    "ManagedOOMMemoryPressure",
    "ManagedOOMMemoryPressureLimit",
    "ManagedOOMPreference",
];

pub const EXEC_UNIT_OPTS: &[&str] = &[
    "ExecSearchPath",
    "WorkingDirectory",
    "RootDirectory",
    "RootImage",
    "RootImageOptions",
    "RootHash",
    "RootHashSignature",
    "RootVerity",
    "MountAPIVFS",
    "ProtectProc",
    "ProcSubset",
    "BindPaths",
    "BindReadOnlyPaths",
    "MountImages",
    "MountFlags",
    "ExtensionImages",
    "ExtensionDirectories",
    "User",
    "Group",
    "DynamicUser",
    "SupplementaryGroups",
    "PAMName",
    "CapabilityBoundingSet",
    "Capabilities",
    "AmbientCapabilities",
    "NoNewPrivileges",
    "SecureBits",
    "SELinuxContext",
    "AppArmorProfile",
    "SmackProcessLabel",
    "LimitCPU",
    "LimitFSIZE",
    "LimitDATA",
    "LimitSTACK",
    "LimitCORE",
    "LimitRSS",
    "LimitNOFILE",
    "LimitAS",
    "LimitNPROC",
    "LimitMEMLOCK",
    "LimitLOCKS",
    "LimitSIGPENDING",
    "LimitMSGQUEUE",
    "LimitNICE",
    "LimitRTPRIO",
    "LimitRTTIME",
    "UMask",
    "CoredumpFilter",
    "KeyringMode",
    "OOMScoreAdjust",
    "TimerSlackNSec",
    "Personality",
    "IgnoreSIGPIPE",
    "Nice",
    "CPUSchedulingPolicy",
    "CPUSchedulingPriority",
    "CPUSchedulingResetOnFork",
    "CPUAffinity",
    "NUMAPolicy",
    "NUMAMask",
    "IOSchedulingClass",
    "IOSchedulingPriority",
    "ProtectSystem",
    "ProtectHome",
    "RuntimeDirectory",
    "StateDirectory",
    "CacheDirectory",
    "LogsDirectory",
    "ConfigurationDirectory",
    "RuntimeDirectoryMode",
    "StateDirectoryMode",
    "CacheDirectoryMode",
    "LogsDirectoryMode",
    "ConfigurationDirectoryMode",
    "RuntimeDirectoryPreserve",
    "TimeoutCleanSec",
    "ReadWritePaths",
    "ReadOnlyPaths",
    "ReadWriteDirectories",
    "ReadOnlyDirectories",
    "InaccessibleDirectories",
    "InaccessiblePaths",
    "ExecPaths",
    "NoExecPaths",
    "TemporaryFileSystem",
    "PrivateTmp",
    "PrivateDevices",
    "PrivateNetwork",
    "NetworkNamespacePath",
    "PrivateIPC",
    "IPCNamespacePath",
    "PrivateUsers",
    "ProtectHostname",
    "ProtectClock",
    "ProtectKernelTunables",
    "ProtectKernelModules",
    "ProtectKernelLogs",
    "ProtectControlGroups",
    "RestrictAddressFamilies",
    "RestrictFileSystems",
    "RestrictNamespaces",
    "LockPersonality",
    "MemoryDenyWriteExecute",
    "RestrictRealtime",
    "RestrictSUIDSGID",
    "RemoveIPC",
    "PrivateMounts",
    "SystemCallFilter",
    "SystemCallErrorNumber",
    "SystemCallArchitectures",
    "SystemCallLog",
    "Environment",
    "EnvironmentFile",
    "PassEnvironment",
    "UnsetEnvironment",
    "StandardInput",
    "StandardOutput",
    "StandardError",
    "StandardInputText",
    "StandardInputData",
    "LogLevelMax",
    "LogExtraFields",
    "LogRateLimitIntervalSec",
    "LogRateLimitBurst",
    "LogFilterPatterns",
    "LogNamespace",
    "SyslogIdentifier",
    "SyslogFacility",
    "SyslogLevel",
    "SyslogLevelPrefix",
    "TTYPath",
    "TTYReset",
    "TTYVHangup",
    "TTYRows",
    "TTYColumns",
    "TTYVTDisallocate",
    "LoadCredential",
    "LoadCredentialEncrypted",
    "SetCredential",
    "SetCredentialEncrypted",
    "UtmpIdentifier",
    "UtmpMode",
];

/// Directives whose argument text is whitespace-delimited into several
/// values rather than kept as one opaque string.
pub static SPACE_DELIM_OPTS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "Documentation",
        "Before",
        "After",
        "Wants",
        "WantedBy",
        "Requires",
        "RequiredBy",
        "Requisite",
        "BindsTo",
        "PartOf",
        "Upholds",
        "Conflicts",
        "OnFailure",
        "OnSuccess",
        "PropagatesReloadTo",
        "ReloadPropagatedFrom",
        "PropagatesStopTo",
        "StopPropagatedFrom",
        "JoinsNamespaceOf",
        "RequiresMountsFor",
        "Sockets",
    ]
});

/// Directives whose arguments name executables this crate should inspect.
pub const COMMAND_DIRECTIVES: &[&str] = &[
    "ExecStart",
    "ExecCondition",
    "ExecStartPre",
    "ExecStartPost",
    "ExecReload",
    "ExecStop",
    "ExecStopPost",
];

/// Top-level Master Structure keys that are catalogs rather than artifact
/// paths, and so must be skipped by anything walking unit entries.
pub const MS_ONLY_KEYS: &[&str] = &["remote_path", "binaries", "libraries", "files", "strings"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_suffix_has_no_kind() {
        assert_eq!(UnitKind::from_suffix("bogus"), None);
    }

    #[test]
    fn service_accepts_exec_and_generic_opts() {
        let kind = UnitKind::Service;
        assert!(kind.accepts("ExecStart"));
        assert!(kind.accepts("Wants"));
        assert!(kind.accepts("CPUWeight"));
        assert!(!kind.accepts("ListenStream"));
    }

    #[test]
    fn socket_accepts_socket_and_exec_opts() {
        let kind = UnitKind::Socket;
        assert!(kind.accepts("BindToDevice"));
        assert!(kind.accepts("ExecStartPre"));
    }
}
