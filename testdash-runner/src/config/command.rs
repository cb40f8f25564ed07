// Copyright (c) The testdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::CommandTemplateError;
use camino::Utf8Path;
use itertools::Itertools;
use serde::Serialize;
use std::fmt;

/// Placeholders accepted by the `[runner]` command.
pub const RUNNER_PLACEHOLDERS: &[&str] = &["target", "profile"];

/// Placeholders accepted by the `[report]` command.
pub const REPORT_PLACEHOLDERS: &[&str] = &["profile", "output"];

/// An external command with `{placeholder}` substitutions in its arguments.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct CommandTemplate {
    program: String,
    args: Vec<String>,
}

impl CommandTemplate {
    /// Creates a new template, checking that every placeholder is one of `known`.
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        known: &[&'static str],
    ) -> Result<Self, CommandTemplateError> {
        let program = program.into();
        if program.trim().is_empty() {
            return Err(CommandTemplateError::EmptyProgram);
        }
        for arg in &args {
            for placeholder in placeholders(arg)? {
                if !known.iter().any(|known| *known == placeholder) {
                    return Err(CommandTemplateError::UnknownPlaceholder {
                        arg: arg.clone(),
                        placeholder: placeholder.to_owned(),
                        known: known.to_vec(),
                    });
                }
            }
        }
        Ok(Self { program, args })
    }

    /// Returns the program this template runs.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Expands placeholders in the arguments with the given values.
    pub(crate) fn expand_args(&self, vars: &[(&str, &str)]) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                vars.iter().fold(arg.clone(), |arg, (name, value)| {
                    arg.replace(&format!("{{{name}}}"), value)
                })
            })
            .collect()
    }

    /// Builds an expression that runs this command in `dir` with combined stdout and stderr
    /// captured, and without treating a non-zero exit as an error.
    pub(crate) fn to_expression(
        &self,
        dir: &Utf8Path,
        vars: &[(&str, &str)],
    ) -> duct::Expression {
        duct::cmd(&self.program, self.expand_args(vars))
            .dir(dir.as_std_path())
            .stdin_null()
            .stderr_to_stdout()
            .stdout_capture()
            .unchecked()
    }

    /// Returns a displayable form of the expanded command line, for diagnostics.
    pub(crate) fn display_expanded<'a>(
        &'a self,
        vars: &'a [(&'a str, &'a str)],
    ) -> DisplayCommand<'a> {
        DisplayCommand {
            template: self,
            vars,
        }
    }
}

impl fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

pub(crate) struct DisplayCommand<'a> {
    template: &'a CommandTemplate,
    vars: &'a [(&'a str, &'a str)],
}

impl fmt::Display for DisplayCommand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args = self.template.expand_args(self.vars);
        if args.is_empty() {
            write!(f, "{}", self.template.program)
        } else {
            write!(f, "{} {}", self.template.program, args.iter().join(" "))
        }
    }
}

fn placeholders(arg: &str) -> Result<Vec<&str>, CommandTemplateError> {
    let mut out = Vec::new();
    let mut rest = arg;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            return Err(CommandTemplateError::UnterminatedPlaceholder {
                arg: arg.to_owned(),
            });
        };
        out.push(&after[..end]);
        rest = &after[end + 1..];
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn expands_runner_placeholders() {
        let template = CommandTemplate::new(
            "go",
            strings(&["test", "-coverprofile={profile}", "{target}"]),
            RUNNER_PLACEHOLDERS,
        )
        .expect("valid template");

        let vars = [("target", "./calc"), ("profile", "coverage_calc_1_0.out")];
        assert_eq!(
            template.expand_args(&vars),
            strings(&["test", "-coverprofile=coverage_calc_1_0.out", "./calc"]),
        );
        assert_eq!(
            template.display_expanded(&vars).to_string(),
            "go test -coverprofile=coverage_calc_1_0.out ./calc",
        );
    }

    #[test]
    fn rejects_placeholder_from_other_section() {
        let err = CommandTemplate::new("go", strings(&["-o", "{output}"]), RUNNER_PLACEHOLDERS)
            .expect_err("output is not a runner placeholder");
        assert_eq!(
            err,
            CommandTemplateError::UnknownPlaceholder {
                arg: "{output}".to_owned(),
                placeholder: "output".to_owned(),
                known: RUNNER_PLACEHOLDERS.to_vec(),
            }
        );
    }

    #[test]
    fn rejects_unterminated_and_empty() {
        assert_eq!(
            CommandTemplate::new("go", strings(&["-html={profile"]), REPORT_PLACEHOLDERS),
            Err(CommandTemplateError::UnterminatedPlaceholder {
                arg: "-html={profile".to_owned()
            }),
        );
        assert_eq!(
            CommandTemplate::new("  ", Vec::new(), REPORT_PLACEHOLDERS),
            Err(CommandTemplateError::EmptyProgram),
        );
    }
}
