/// Readiness of the machine that runs the suites, as the backend reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentReport {
    pub ok: bool,
    pub platform: Option<String>,
    pub python: Option<String>,
    pub python_exe: Option<String>,
    pub robot_module: Option<String>,
    pub robot_cmd: Option<String>,
    pub node_cmd: Option<String>,
    pub npm_cmd: Option<String>,
    pub adb_cmd: Option<String>,
    pub packages_ok: Vec<String>,
    pub packages_missing: Vec<String>,
    pub packages_import_failed: Vec<String>,
    pub problems: Vec<String>,
}

fn or_dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("-")
}

impl EnvironmentReport {
    pub fn headline(&self) -> &'static str {
        if self.ok {
            "Environment OK, ready to run."
        } else {
            "Environment incomplete, fixes needed."
        }
    }

    /// Operator-facing rendering. Sections with nothing to say are left out.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![self.headline().to_string(), String::new()];

        if let Some(python) = self.python.as_deref() {
            lines.push(format!("Python: {python} ({})", or_dash(self.python_exe.as_deref())));
        }
        if self.robot_module.is_some() || self.robot_cmd.is_some() {
            lines.push(format!(
                "Robot Framework: {} ({})",
                or_dash(self.robot_module.as_deref()),
                or_dash(self.robot_cmd.as_deref())
            ));
        }
        for (label, cmd) in [
            ("Node", &self.node_cmd),
            ("NPM", &self.npm_cmd),
            ("ADB", &self.adb_cmd),
        ] {
            if let Some(cmd) = cmd.as_deref() {
                lines.push(format!("{label}: {cmd}"));
            }
        }
        if let Some(platform) = self.platform.as_deref() {
            lines.push(format!("Platform: {platform}"));
        }
        lines.push(String::new());

        if !self.packages_missing.is_empty() {
            lines.push("Missing packages (requirements.txt):".to_string());
            lines.extend(self.packages_missing.iter().map(|pkg| format!("- {pkg}")));
            lines.push("Hint: install the requirements, then check again.".to_string());
            lines.push(String::new());
        }
        if !self.packages_ok.is_empty() {
            lines.push("Packages found:".to_string());
            lines.push(self.packages_ok.join(", "));
            lines.push(String::new());
        }
        if !self.packages_import_failed.is_empty() {
            lines.push("Installed but failed to import:".to_string());
            lines.extend(self.packages_import_failed.iter().map(|pkg| format!("- {pkg}")));
            lines.push(String::new());
        }
        if !self.problems.is_empty() {
            lines.push("Notes:".to_string());
            lines.extend(self.problems.iter().map(|problem| format!("- {problem}")));
            lines.push(String::new());
        }

        while lines.last().is_some_and(|line| line.is_empty()) {
            lines.pop();
        }
        lines
    }
}
