use serde::{Deserialize, Deserializer, Serialize, de};

use crate::config::ConfigError;

const INVALID_FILE_EXT_CHARS: [char; 2] = ['/', '.'];

/// Stem used for staged sources when a profile does not name its own file
const DEFAULT_SOURCE_STEM: &str = "Main";

/// Execution profile for one programming language
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Language {
    /// Human-readable name for the language (e.g., "C++ (GCC)")
    pub name: String,

    /// File extension
    pub extension: FileExtension,

    /// Required file name for the staged source.
    ///
    /// Languages with an entry-point naming rule (Java's public class) set
    /// this explicitly; everything else uses `Main.<extension>`.
    #[serde(default)]
    pub source_name: Option<String>,

    /// Container image both phases run in
    pub image: String,

    /// Whether a local toolchain is registered for the fallback mode
    #[serde(default)]
    pub local: bool,

    /// Compilation configuration (None for interpreted languages)
    #[serde(default)]
    pub compile: Option<CompileConfig>,

    /// Execution configuration
    pub run: RunConfig,
}

impl Language {
    /// Check if the language is compiled
    pub fn is_compiled(&self) -> bool {
        self.compile.is_some()
    }

    /// Get the source file name for this language
    pub fn source_name(&self) -> String {
        match self.source_name {
            Some(ref name) => name.clone(),
            None => format!("{DEFAULT_SOURCE_STEM}.{}", self.extension),
        }
    }

    /// Name substituted for `{binary}`; the source itself for interpreted languages
    pub fn binary_name(&self) -> String {
        match self.compile {
            Some(ref compile) => compile.output_name.clone(),
            None => self.source_name(),
        }
    }

    /// Compile command with placeholders expanded
    pub fn compile_command(&self) -> Option<Vec<String>> {
        self.compile.as_ref().map(|compile| {
            Self::expand_command(&compile.command, &self.source_name(), &self.binary_name())
        })
    }

    /// Run command with placeholders expanded
    pub fn run_command(&self) -> Vec<String> {
        Self::expand_command(&self.run.command, &self.source_name(), &self.binary_name())
    }

    /// Expand placeholders in the given command
    pub fn expand_command(command: &[String], source: &str, binary: &str) -> Vec<String> {
        command
            .iter()
            .map(|arg| arg.replace("{source}", source).replace("{binary}", binary))
            .collect()
    }
}

/// File extension without dot (e.g., "cpp")
#[derive(Debug, Clone, Serialize)]
pub struct FileExtension(String);

impl FileExtension {
    pub fn new(extension: &str) -> Result<Self, ConfigError> {
        let contains_invalid = extension
            .chars()
            .any(|c| INVALID_FILE_EXT_CHARS.contains(&c));
        if contains_invalid {
            return Err(ConfigError::InvalidFileExtChars);
        }
        Ok(Self(extension.to_owned()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for FileExtension {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FileExtension::new(&s).map_err(|_| {
            de::Error::invalid_value(
                de::Unexpected::Str(&s),
                &"a file extension without '/' or '.' characters",
            )
        })
    }
}

impl std::fmt::Display for FileExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Configuration for the compilation step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileConfig {
    /// Command and arguments with placeholders
    /// Placeholders: {source}, {binary}
    pub command: Vec<String>,

    /// Name of the compiled unit (e.g., "MainExec", or "Main" for a Java class)
    pub output_name: String,
}

/// Configuration for the execution step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Command and arguments with placeholders
    /// Placeholders: {source}, {binary}
    pub command: Vec<String>,
}

#[cfg(test)]
pub(crate) fn test_language(compile: Option<CompileConfig>, run: &[&str]) -> Language {
    Language {
        name: "Test".to_owned(),
        extension: FileExtension::new("sh").unwrap(),
        source_name: None,
        image: "test-image".to_owned(),
        local: true,
        compile,
        run: RunConfig {
            command: run.iter().map(|s| s.to_string()).collect(),
        },
    }
}
