use crate::config::types::{Result, RunnerError};

/// Languages with a built-in preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Assembly,
    Ats,
    Bash,
    C,
    Clisp,
    Clojure,
    Cobol,
    CoffeeScript,
    Cpp,
    Crystal,
    Csharp,
    D,
    Dart,
    Elixir,
    Elm,
    Erlang,
    Fsharp,
    Go,
    Groovy,
    Guile,
    Hare,
    Haskell,
    Idris,
    Java,
    JavaScript,
    Julia,
    Kotlin,
    Lua,
    Mercury,
    Nim,
    Nix,
    Ocaml,
    Pascal,
    Perl,
    Php,
    Python,
    Raku,
    Ruby,
    Rust,
    Sac,
    Scala,
    Swift,
    TypeScript,
    Zig,
}

impl Language {
    pub const ALL: [Language; 44] = [
        Language::Assembly,
        Language::Ats,
        Language::Bash,
        Language::C,
        Language::Clisp,
        Language::Clojure,
        Language::Cobol,
        Language::CoffeeScript,
        Language::Cpp,
        Language::Crystal,
        Language::Csharp,
        Language::D,
        Language::Dart,
        Language::Elixir,
        Language::Elm,
        Language::Erlang,
        Language::Fsharp,
        Language::Go,
        Language::Groovy,
        Language::Guile,
        Language::Hare,
        Language::Haskell,
        Language::Idris,
        Language::Java,
        Language::JavaScript,
        Language::Julia,
        Language::Kotlin,
        Language::Lua,
        Language::Mercury,
        Language::Nim,
        Language::Nix,
        Language::Ocaml,
        Language::Pascal,
        Language::Perl,
        Language::Php,
        Language::Python,
        Language::Raku,
        Language::Ruby,
        Language::Rust,
        Language::Sac,
        Language::Scala,
        Language::Swift,
        Language::TypeScript,
        Language::Zig,
    ];

    /// Canonical lower-case name used in requests
    pub fn name(self) -> &'static str {
        match self {
            Language::Assembly => "assembly",
            Language::Ats => "ats",
            Language::Bash => "bash",
            Language::C => "c",
            Language::Clisp => "clisp",
            Language::Clojure => "clojure",
            Language::Cobol => "cobol",
            Language::CoffeeScript => "coffeescript",
            Language::Cpp => "cpp",
            Language::Crystal => "crystal",
            Language::Csharp => "csharp",
            Language::D => "d",
            Language::Dart => "dart",
            Language::Elixir => "elixir",
            Language::Elm => "elm",
            Language::Erlang => "erlang",
            Language::Fsharp => "fsharp",
            Language::Go => "go",
            Language::Groovy => "groovy",
            Language::Guile => "guile",
            Language::Hare => "hare",
            Language::Haskell => "haskell",
            Language::Idris => "idris",
            Language::Java => "java",
            Language::JavaScript => "javascript",
            Language::Julia => "julia",
            Language::Kotlin => "kotlin",
            Language::Lua => "lua",
            Language::Mercury => "mercury",
            Language::Nim => "nim",
            Language::Nix => "nix",
            Language::Ocaml => "ocaml",
            Language::Pascal => "pascal",
            Language::Perl => "perl",
            Language::Php => "php",
            Language::Python => "python",
            Language::Raku => "raku",
            Language::Ruby => "ruby",
            Language::Rust => "rust",
            Language::Sac => "sac",
            Language::Scala => "scala",
            Language::Swift => "swift",
            Language::TypeScript => "typescript",
            Language::Zig => "zig",
        }
    }

    /// Look a language up by canonical name or common alias, ignoring case
    pub fn from_name(name: &str) -> Result<Self> {
        let wanted = name.trim().to_ascii_lowercase();

        let alias = match wanted.as_str() {
            "asm" | "nasm" => Some(Language::Assembly),
            "sh" => Some(Language::Bash),
            "lisp" | "commonlisp" => Some(Language::Clisp),
            "c++" | "cxx" | "cc" => Some(Language::Cpp),
            "c#" | "cs" => Some(Language::Csharp),
            "f#" | "fs" => Some(Language::Fsharp),
            "golang" => Some(Language::Go),
            "scheme" => Some(Language::Guile),
            "js" | "node" => Some(Language::JavaScript),
            "py" | "python3" => Some(Language::Python),
            "rb" => Some(Language::Ruby),
            "rs" => Some(Language::Rust),
            "ts" => Some(Language::TypeScript),
            _ => None,
        };

        alias
            .or_else(|| Language::ALL.iter().copied().find(|l| l.name() == wanted))
            .ok_or_else(|| RunnerError::Validation(format!("unsupported language: {}", name)))
    }

    /// Extension of additional source files passed to the build step
    pub fn source_extension(self) -> Option<&'static str> {
        match self {
            Language::Ats => Some("dats"),
            Language::C | Language::Sac => Some("c"),
            Language::Cobol => Some("cob"),
            Language::Cpp => Some("cpp"),
            Language::Csharp => Some("cs"),
            Language::D => Some("d"),
            Language::Elixir => Some("ex"),
            Language::Erlang => Some("erl"),
            Language::Fsharp => Some("fs"),
            Language::Mercury => Some("m"),
            Language::Ocaml => Some("ml"),
            Language::Scala => Some("scala"),
            Language::Swift => Some("swift"),
            Language::TypeScript => Some("ts"),
            _ => None,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
