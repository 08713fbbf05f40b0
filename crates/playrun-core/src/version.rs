//! `ansible --version` report parsing
//!
//! The report is a header line (`ansible 2.9.23` or `ansible [core 2.12.7]`)
//! followed by indented `key = value` lines. Keys are matched against a fixed
//! table; unknown keys are ignored so newer ansible releases still parse.

use crate::error::ProbeError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Parsed `ansible --version` output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionReport {
    /// ansible (or ansible-core) version
    pub version: String,
    /// Whether the header named ansible-core (`ansible [core x.y.z]`)
    pub core: bool,
    /// `config file`, `None` when ansible reports no config
    pub config_file: Option<PathBuf>,
    /// `configured module search path`, verbatim
    pub module_search_path: Option<String>,
    /// `ansible python module location`
    pub module_location: Option<PathBuf>,
    /// `ansible collection location`, verbatim
    pub collection_location: Option<String>,
    /// `executable location`
    pub executable_location: Option<PathBuf>,
    /// `python version`
    pub python_version: Option<String>,
    /// `jinja version`
    pub jinja_version: Option<String>,
    /// `libyaml`
    pub libyaml: Option<bool>,
}

type FieldSetter = fn(&mut VersionReport, &str);

const FIELDS: &[(&str, FieldSetter)] = &[
    ("config file", |r, v| r.config_file = path_or_none(v)),
    ("configured module search path", |r, v| {
        r.module_search_path = Some(v.to_string())
    }),
    ("ansible python module location", |r, v| {
        r.module_location = path_or_none(v)
    }),
    ("ansible collection location", |r, v| {
        r.collection_location = Some(v.to_string())
    }),
    ("executable location", |r, v| {
        r.executable_location = path_or_none(v)
    }),
    ("python version", |r, v| r.python_version = Some(v.to_string())),
    ("jinja version", |r, v| r.jinja_version = Some(v.to_string())),
    ("libyaml", |r, v| r.libyaml = Some(v.eq_ignore_ascii_case("true"))),
];

fn header_regex() -> &'static Regex {
    static HEADER: OnceLock<Regex> = OnceLock::new();
    HEADER.get_or_init(|| {
        Regex::new(r"^ansible(?:-core)?\s+(?:\[core\s+(?P<core>[^\]\s]+)\]|(?P<plain>\S+))(?:\s+.*)?$")
            .expect("header regex is valid")
    })
}

fn path_or_none(value: &str) -> Option<PathBuf> {
    if value.is_empty() || value == "None" {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

impl VersionReport {
    /// Parse the text printed by `ansible --version`
    pub fn parse(text: &str) -> Result<Self, ProbeError> {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());

        let header = lines.next().ok_or(ProbeError::Empty)?.trim();
        let captures = header_regex()
            .captures(header)
            .ok_or_else(|| ProbeError::Unparsable(header.to_string()))?;

        let mut report = VersionReport::default();
        if let Some(core) = captures.name("core") {
            report.version = core.as_str().to_string();
            report.core = true;
        } else if let Some(plain) = captures.name("plain") {
            report.version = plain.as_str().to_string();
        }

        for line in lines {
            let Some((key, value)) = line.split_once(" = ") else {
                continue;
            };
            let key = key.trim();
            if let Some((_, set)) = FIELDS.iter().find(|(name, _)| *name == key) {
                set(&mut report, value.trim());
            }
        }

        Ok(report)
    }

    /// The site-packages directory ansible itself is installed into: the
    /// module location with its trailing `ansible` component removed.
    pub fn site_packages(&self) -> Result<PathBuf, ProbeError> {
        let location = self
            .module_location
            .as_deref()
            .ok_or(ProbeError::MissingModuleLocation)?;

        if location.file_name().is_some_and(|name| name == "ansible") {
            Ok(location
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default())
        } else {
            Ok(location.to_path_buf())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CORE_212: &str = "\
ansible [core 2.12.7]
  config file = /etc/ansible/ansible.cfg
  configured module search path = ['/root/.ansible/plugins/modules', '/usr/share/ansible/plugins/modules']
  ansible python module location = /usr/lib/python3.8/site-packages/ansible
  ansible collection location = /root/.ansible/collections:/usr/share/ansible/collections
  executable location = /usr/bin/ansible
  python version = 3.8.13 (default, Jun 24 2022, 15:27:57) [GCC 8.5.0 20210514 (Red Hat 8.5.0-13)]
  jinja version = 2.11.3
  libyaml = True
";

    const ANSIBLE_29: &str = "\
ansible 2.9.23
  config file = /root/.ansible.cfg
  configured module search path = ['/root/.ansible/plugins/modules', '/usr/share/ansible/plugins/modules']
  ansible python module location = /usr/lib/python3.6/site-packages/ansible
  executable location = /usr/bin/ansible
  python version = 3.6.8 (default, Mar 19 2021, 05:13:41) [GCC 8.4.1 20200928 (Red Hat 8.4.1-1)]
";

    #[test]
    fn test_parse_core_report() {
        let report = VersionReport::parse(CORE_212).unwrap();
        assert_eq!(report.version, "2.12.7");
        assert!(report.core);
        assert_eq!(
            report.config_file.as_deref(),
            Some(Path::new("/etc/ansible/ansible.cfg"))
        );
        assert_eq!(
            report.collection_location.as_deref(),
            Some("/root/.ansible/collections:/usr/share/ansible/collections")
        );
        assert_eq!(report.jinja_version.as_deref(), Some("2.11.3"));
        assert_eq!(report.libyaml, Some(true));
        assert_eq!(
            report.site_packages().unwrap(),
            PathBuf::from("/usr/lib/python3.8/site-packages")
        );
    }

    #[test]
    fn test_parse_classic_report() {
        let report = VersionReport::parse(ANSIBLE_29).unwrap();
        assert_eq!(report.version, "2.9.23");
        assert!(!report.core);
        assert!(report.collection_location.is_none());
        assert_eq!(
            report.site_packages().unwrap(),
            PathBuf::from("/usr/lib/python3.6/site-packages")
        );
    }

    #[test]
    fn test_parse_devel_checkout_headers() {
        let classic = VersionReport::parse(
            "ansible 2.9.0.dev0 (devel 0ef14ff8cc) last updated 2019/06/11 10:41:09 (GMT +000)\n  \
             ansible python module location = /usr/lib/python3.6/site-packages/ansible\n",
        )
        .unwrap();
        assert_eq!(classic.version, "2.9.0.dev0");
        assert!(!classic.core);
        assert_eq!(
            classic.site_packages().unwrap(),
            PathBuf::from("/usr/lib/python3.6/site-packages")
        );

        let core = VersionReport::parse(
            "ansible [core 2.12.0.dev0] (devel 5f2c2a9c86) last updated 2021/09/01 12:00:00 (GMT +000)\n  \
             ansible python module location = /opt/ansible/lib/ansible\n",
        )
        .unwrap();
        assert_eq!(core.version, "2.12.0.dev0");
        assert!(core.core);
        assert_eq!(core.site_packages().unwrap(), PathBuf::from("/opt/ansible/lib"));
    }

    #[test]
    fn test_parse_empty_report() {
        assert_eq!(VersionReport::parse(""), Err(ProbeError::Empty));
        assert_eq!(VersionReport::parse("\n  \n"), Err(ProbeError::Empty));
    }

    #[test]
    fn test_parse_unrecognised_header() {
        let err = VersionReport::parse("bash: ansible: command not found\n").unwrap_err();
        assert!(matches!(err, ProbeError::Unparsable(_)));
    }

    #[test]
    fn test_config_file_none() {
        let report = VersionReport::parse("ansible 2.9.6\n  config file = None\n").unwrap();
        assert!(report.config_file.is_none());
    }

    #[test]
    fn test_missing_module_location() {
        let report = VersionReport::parse("ansible 2.9.6\n").unwrap();
        assert_eq!(
            report.site_packages(),
            Err(ProbeError::MissingModuleLocation)
        );
    }
}
