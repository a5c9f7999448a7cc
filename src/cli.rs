//! Interface de linha de comando do gallog-cleaner baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (login, galleries, clean)
//! e flags globais (--user, --password, --config, --concurrency, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use gallog_cleaner::model::ContentKind;

/// gallog-cleaner: apaga em massa seus posts ou comentários do gallog.
#[derive(Debug, Parser)]
#[command(name = "gallog-cleaner", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Identificador da conta.
    #[arg(long, short, global = true)]
    pub user: Option<String>,

    /// Senha da conta. Nunca é gravada em disco.
    #[arg(long, global = true, env = "GALLOG_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Caminho alternativo para o arquivo de configuração.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Deleções simultâneas (1 a 4), sobrepõe o arquivo.
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Tipo de conteúdo aceito pela CLI, mapeado para [`ContentKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    /// Posts.
    Posting,
    /// Comentários.
    Comment,
}

impl From<KindArg> for ContentKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Posting => ContentKind::Posting,
            KindArg::Comment => ContentKind::Comment,
        }
    }
}

/// Serviço de captcha escolhido na linha de comando.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CaptchaArg {
    #[value(name = "2captcha")]
    TwoCaptcha,
    #[value(name = "anticaptcha")]
    AntiCaptcha,
}

impl CaptchaArg {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptchaArg::TwoCaptcha => "2captcha",
            CaptchaArg::AntiCaptcha => "anticaptcha",
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Apenas verifica se as credenciais são aceitas.
    Login,

    /// Lista as galerias onde há conteúdo do tipo escolhido.
    Galleries {
        #[arg(long, value_enum)]
        kind: KindArg,
    },

    /// Apaga todo o conteúdo do tipo escolhido.
    Clean {
        #[arg(long, value_enum)]
        kind: KindArg,

        /// Restringe a limpeza a uma galeria. Sem ela, todas as galerias.
        #[arg(long)]
        gallery: Option<String>,

        /// Chave da API do serviço de captcha.
        #[arg(long, env = "CAPTCHA_API_KEY", hide_env_values = true)]
        captcha_key: Option<String>,

        /// Serviço de captcha. Sem ele, usa o do arquivo de configuração.
        #[arg(long, value_enum)]
        captcha_type: Option<CaptchaArg>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_clean_subcommand() {
        let cli = Cli::parse_from([
            "gallog-cleaner",
            "--user",
            "alice",
            "--password",
            "pw",
            "clean",
            "--kind",
            "comment",
            "--gallery",
            "programming",
            "--captcha-type",
            "anticaptcha",
        ]);
        assert_eq!(cli.user.as_deref(), Some("alice"));
        match cli.command {
            Command::Clean {
                kind,
                gallery,
                captcha_type,
                ..
            } => {
                assert_eq!(kind, KindArg::Comment);
                assert_eq!(gallery.as_deref(), Some("programming"));
                assert_eq!(captcha_type, Some(CaptchaArg::AntiCaptcha));
            }
            _ => panic!("expected Clean command"),
        }
    }

    #[test]
    fn cli_parses_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "gallog-cleaner",
            "galleries",
            "--kind",
            "posting",
            "--concurrency",
            "3",
            "--verbose",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.concurrency, Some(3));
        assert!(matches!(
            cli.command,
            Command::Galleries {
                kind: KindArg::Posting
            }
        ));
    }

    #[test]
    fn captcha_type_uses_backend_names() {
        assert_eq!(CaptchaArg::TwoCaptcha.as_str(), "2captcha");
        let cli = Cli::try_parse_from([
            "gallog-cleaner",
            "clean",
            "--kind",
            "posting",
            "--captcha-type",
            "2captcha",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Clean {
                captcha_type: Some(CaptchaArg::TwoCaptcha),
                ..
            }
        ));
    }

    #[test]
    fn kind_is_required() {
        assert!(Cli::try_parse_from(["gallog-cleaner", "clean"]).is_err());
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
