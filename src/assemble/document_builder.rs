//! PDD Markdown Assembly
//!
//! Builds the primary document from the step list, narrative sections, and
//! the extracted screenshot directory. Every optional input is guarded
//! independently: a missing narrative field renders nothing for that
//! subsection, a missing screenshot renders a visible warning, and no step
//! is ever dropped.

use super::ProjectMetadata;
use crate::model::{screenshot_filename, DocumentSections, ProcessException, Step};
use std::fmt::Write;
use std::path::{Path, PathBuf};

/// Markdown builder for the Process Description Document
pub struct DocumentBuilder {
    /// Buffer for building markdown
    buffer: String,
    /// Screenshots referenced but not found on disk
    missing_screenshots: usize,
    /// Screenshot directory as seen from the document's own directory
    link_dir: PathBuf,
}

impl DocumentBuilder {
    /// Create a new document builder
    pub fn new() -> Self {
        Self {
            buffer: String::with_capacity(8192),
            missing_screenshots: 0,
            link_dir: PathBuf::new(),
        }
    }

    /// Number of steps whose screenshot was missing in the last build
    pub fn missing_screenshots(&self) -> usize {
        self.missing_screenshots
    }

    /// Build the full document.
    ///
    /// Steps are rendered in the given order; the step list is the source
    /// of truth and is never re-sorted here. `document_dir` is where the
    /// document itself will live: screenshot links are written relative to
    /// it so a Markdown renderer resolves them correctly wherever the
    /// output tree is rooted.
    pub fn build(
        &mut self,
        metadata: &ProjectMetadata,
        sections: &DocumentSections,
        steps: &[Step],
        screenshot_dir: &Path,
        document_dir: &Path,
    ) -> String {
        self.buffer.clear();
        self.missing_screenshots = 0;
        self.link_dir = relative_path(screenshot_dir, document_dir);

        // Writing to a String is infallible, so these cannot fail
        self.write_header(metadata, sections).expect("write to String");
        self.write_introduction(sections).expect("write to String");
        self.write_context(sections).expect("write to String");
        self.write_as_is(sections, steps, screenshot_dir)
            .expect("write to String");
        self.write_to_be(sections).expect("write to String");
        self.write_exceptions(&sections.exceptions)
            .expect("write to String");
        self.write_operational(sections).expect("write to String");

        std::mem::take(&mut self.buffer)
    }

    /// Title and metadata table
    fn write_header(
        &mut self,
        metadata: &ProjectMetadata,
        sections: &DocumentSections,
    ) -> std::fmt::Result {
        let title = metadata
            .project_name
            .as_deref()
            .or(sections.process_name.as_deref())
            .unwrap_or("Untitled Process");
        writeln!(self.buffer, "# {title} - Process Description Document")?;
        writeln!(self.buffer)?;

        let acronym = metadata
            .project_acronym
            .as_deref()
            .or(sections.acronym.as_deref());

        writeln!(self.buffer, "| Field | Value |")?;
        writeln!(self.buffer, "|---|---|")?;
        writeln!(self.buffer, "| Acronym | {} |", acronym.unwrap_or("-"))?;
        writeln!(
            self.buffer,
            "| Author | {} |",
            metadata.author_name.as_deref().unwrap_or("-")
        )?;
        writeln!(
            self.buffer,
            "| Version | {} |",
            metadata.version.as_deref().unwrap_or("-")
        )?;
        writeln!(
            self.buffer,
            "| Status | {} |",
            metadata.status.as_deref().unwrap_or("-")
        )?;
        writeln!(
            self.buffer,
            "| Generated | {} |",
            chrono::Local::now().format("%Y-%m-%d")
        )?;
        writeln!(self.buffer)?;
        Ok(())
    }

    fn write_introduction(&mut self, sections: &DocumentSections) -> std::fmt::Result {
        let has_any = sections.purpose.is_some()
            || sections.objectives.is_some()
            || sections.scope_in.is_some()
            || sections.scope_out.is_some();
        if !has_any {
            return Ok(());
        }

        writeln!(self.buffer, "## Introduction")?;
        writeln!(self.buffer)?;
        self.write_subsection("Purpose", sections.purpose.as_deref())?;
        self.write_subsection("Objectives", sections.objectives.as_deref())?;
        self.write_subsection("Scope: Included", sections.scope_in.as_deref())?;
        self.write_subsection("Scope: Excluded", sections.scope_out.as_deref())?;
        Ok(())
    }

    fn write_context(&mut self, sections: &DocumentSections) -> std::fmt::Result {
        if let Some(context) = &sections.context {
            writeln!(self.buffer, "## Process Context")?;
            writeln!(self.buffer)?;
            writeln!(self.buffer, "{context}")?;
            writeln!(self.buffer)?;
        }
        Ok(())
    }

    fn write_as_is(
        &mut self,
        sections: &DocumentSections,
        steps: &[Step],
        screenshot_dir: &Path,
    ) -> std::fmt::Result {
        writeln!(self.buffer, "## As-Is Process")?;
        writeln!(self.buffer)?;

        if let Some(summary) = &sections.as_is_summary {
            writeln!(self.buffer, "{summary}")?;
            writeln!(self.buffer)?;
        }

        if !sections.user_roles.is_empty() {
            writeln!(self.buffer, "### User Roles")?;
            writeln!(self.buffer)?;
            for role in &sections.user_roles {
                writeln!(self.buffer, "- {role}")?;
            }
            writeln!(self.buffer)?;
        }

        if sections.bpmn_xml.is_some() {
            writeln!(
                self.buffer,
                "A simplified process flow diagram accompanies this document as BPMN 2.0 XML."
            )?;
            writeln!(self.buffer)?;
        }

        writeln!(self.buffer, "### Detailed Steps")?;
        writeln!(self.buffer)?;
        if steps.is_empty() {
            writeln!(self.buffer, "*No detailed steps were identified.*")?;
            writeln!(self.buffer)?;
        }
        for step in steps {
            self.write_step(step, screenshot_dir)?;
        }

        self.write_subsection("Inputs", sections.inputs.as_deref())?;
        self.write_subsection("Outputs", sections.outputs.as_deref())?;
        self.write_subsection("Business Rules", sections.business_rules.as_deref())?;
        Ok(())
    }

    /// One subsection per step, keyed by step number, with the screenshot
    /// embedded when it exists and a visible warning when it does not.
    fn write_step(&mut self, step: &Step, screenshot_dir: &Path) -> std::fmt::Result {
        match step.step_number {
            Some(n) => writeln!(self.buffer, "#### Step {n}")?,
            None => writeln!(self.buffer, "#### Step (unnumbered)")?,
        }
        writeln!(self.buffer)?;

        writeln!(
            self.buffer,
            "{}",
            step.description.as_deref().unwrap_or("*No description.*")
        )?;
        writeln!(self.buffer)?;

        if let Some(app) = &step.application_in_focus {
            writeln!(self.buffer, "- **Application:** {app}")?;
        }
        if let Some(action) = &step.action_type_inferred {
            writeln!(self.buffer, "- **Action detail:** {action}")?;
        }
        if let Some(ts) = step.timestamp_ms {
            writeln!(self.buffer, "- **Observed at:** {ts} ms")?;
        }
        writeln!(self.buffer)?;

        match step.step_number {
            Some(n) => {
                let filename = screenshot_filename(n);
                // Existence is checked on the real path; the embedded link
                // is relative to the document so renderers resolve it
                let link = self.link_dir.join(&filename);
                if screenshot_dir.join(&filename).exists() {
                    writeln!(self.buffer, "![Step {n} screenshot]({})", link.display())?;
                } else {
                    writeln!(
                        self.buffer,
                        "> **Warning:** screenshot for step {n} is missing (expected `{}`).",
                        link.display()
                    )?;
                    self.missing_screenshots += 1;
                }
            }
            None => {
                writeln!(
                    self.buffer,
                    "> **Warning:** step has no number; no screenshot can be associated."
                )?;
                self.missing_screenshots += 1;
            }
        }
        writeln!(self.buffer)?;
        Ok(())
    }

    fn write_to_be(&mut self, sections: &DocumentSections) -> std::fmt::Result {
        if sections.to_be_summary.is_none() && sections.human_interaction.is_none() {
            return Ok(());
        }
        writeln!(self.buffer, "## To-Be Process")?;
        writeln!(self.buffer)?;
        self.write_subsection("Automation Summary", sections.to_be_summary.as_deref())?;
        self.write_subsection("Human Interaction Points", sections.human_interaction.as_deref())?;
        Ok(())
    }

    fn write_exceptions(&mut self, exceptions: &[ProcessException]) -> std::fmt::Result {
        if exceptions.is_empty() {
            return Ok(());
        }
        writeln!(self.buffer, "## Exception Scenarios")?;
        writeln!(self.buffer)?;
        writeln!(self.buffer, "| Type | Description | Trigger | Handling |")?;
        writeln!(self.buffer, "|---|---|---|---|")?;
        for exc in exceptions {
            writeln!(
                self.buffer,
                "| {} | {} | {} | {} |",
                exc.exception_type.as_deref().unwrap_or("-"),
                exc.description.as_deref().unwrap_or("-"),
                exc.potential_trigger.as_deref().unwrap_or("-"),
                exc.suggested_handling.as_deref().unwrap_or("-"),
            )?;
        }
        writeln!(self.buffer)?;
        Ok(())
    }

    fn write_operational(&mut self, sections: &DocumentSections) -> std::fmt::Result {
        if sections.dependencies.is_none() && sections.reporting.is_none() {
            return Ok(());
        }
        writeln!(self.buffer, "## Operational Considerations")?;
        writeln!(self.buffer)?;
        self.write_subsection("Dependencies", sections.dependencies.as_deref())?;
        self.write_subsection("Reporting", sections.reporting.as_deref())?;
        Ok(())
    }

    /// Render a titled subsection only when its content is present.
    fn write_subsection(&mut self, title: &str, content: Option<&str>) -> std::fmt::Result {
        if let Some(text) = content {
            writeln!(self.buffer, "### {title}")?;
            writeln!(self.buffer)?;
            writeln!(self.buffer, "{text}")?;
            writeln!(self.buffer)?;
        }
        Ok(())
    }
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Express `target` relative to `base` by stripping the shared prefix and
/// climbing out of the remaining `base` components. Returns `target`
/// unchanged when the two roots are incompatible (one absolute, one not).
fn relative_path(target: &Path, base: &Path) -> PathBuf {
    if target.is_absolute() != base.is_absolute() {
        return target.to_path_buf();
    }

    let mut target_parts = target.components().peekable();
    let mut base_parts = base.components().peekable();
    while let (Some(t), Some(b)) = (target_parts.peek(), base_parts.peek()) {
        if t != b {
            break;
        }
        target_parts.next();
        base_parts.next();
    }

    let mut relative = PathBuf::new();
    for _ in base_parts {
        relative.push("..");
    }
    for part in target_parts {
        relative.push(part);
    }
    relative
}
