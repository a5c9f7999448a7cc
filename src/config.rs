//! Configuração do gallog-cleaner carregada a partir de `gallog-cleaner.toml`.
//!
//! A struct [`CleanerConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `CAPTCHA_API_KEY` tem precedência sobre o arquivo.
//! Identidade e senha nunca são lidas nem gravadas aqui.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::challenge::CaptchaBackend;

/// Nome do arquivo procurado no diretório atual.
pub const CONFIG_FILE: &str = "gallog-cleaner.toml";

/// Limite superior de deleções simultâneas.
pub const MAX_CONCURRENCY: usize = 4;

/// Configuração de nível superior carregada de `gallog-cleaner.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CleanerConfig {
    /// Página principal, usada no handshake de login.
    pub main_url: String,

    /// Servidor de autenticação.
    pub sign_url: String,

    /// Raiz do gallog (listagens e deleção).
    pub gallog_url: String,

    /// User-Agent enviado em todas as requisições.
    pub user_agent: String,

    /// Timeout por requisição, em segundos.
    pub request_timeout_secs: u64,

    /// Deleções em paralelo (1 a 4).
    pub concurrency: usize,

    /// Tentativas totais por item em falhas transitórias.
    pub max_attempts: u32,

    /// Atraso base em milissegundos para backoff exponencial.
    pub base_delay_ms: u64,

    /// Pausa antes de despachar cada nova deleção.
    pub dispatch_delay_ms: u64,

    /// Páginas máximas percorridas por galeria.
    pub max_pages: u32,

    /// Parâmetros do serviço de captcha.
    pub captcha: CaptchaConfig,
}

/// Parâmetros do serviço de resolução de captcha.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptchaConfig {
    /// Serviço usado quando uma chave é fornecida sem tipo.
    pub backend: CaptchaBackend,

    /// Chave da API; vazia desativa a resolução.
    pub api_key: String,

    /// Intervalo entre consultas ao serviço, em milissegundos.
    pub poll_interval_ms: u64,

    /// Consultas máximas antes de desistir (timeout).
    pub max_polls: u32,

    /// Site key do reCAPTCHA do gallog.
    pub site_key: String,

    pub two_captcha_url: String,

    pub anti_captcha_url: String,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            main_url: "https://www.dcinside.com".to_string(),
            sign_url: "https://sign.dcinside.com".to_string(),
            gallog_url: "https://gallog.dcinside.com".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            request_timeout_secs: 30,
            concurrency: 1,
            max_attempts: 3,
            base_delay_ms: 1000,
            dispatch_delay_ms: 500,
            max_pages: 100,
            captcha: CaptchaConfig::default(),
        }
    }
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            backend: CaptchaBackend::TwoCaptcha,
            api_key: String::new(),
            poll_interval_ms: 5000,
            max_polls: 24,
            site_key: "6LcJyr4UAAAAAOy9Q_e9sDWPSHJ_aXus4UnYLfgL".to_string(),
            two_captcha_url: "http://2captcha.com".to_string(),
            anti_captcha_url: "https://api.anti-captcha.com".to_string(),
        }
    }
}

impl CleanerConfig {
    /// Carrega a configuração de `gallog-cleaner.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Carrega a configuração de um caminho explícito.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str::<CleanerConfig>(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            Self::default()
        };

        // Variável de ambiente tem precedência sobre o arquivo de configuração para a chave API.
        if let Ok(key) = std::env::var("CAPTCHA_API_KEY")
            && !key.is_empty()
        {
            config.captcha.api_key = key;
        }

        config.concurrency = config.concurrency.clamp(1, MAX_CONCURRENCY);
        config.max_attempts = config.max_attempts.max(1);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_values() {
        let config = CleanerConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay_ms, 1000);
        assert_eq!(config.dispatch_delay_ms, 500);
        assert_eq!(config.max_pages, 100);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.captcha.backend, CaptchaBackend::TwoCaptcha);
        assert!(config.captcha.api_key.is_empty());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            concurrency = 3
            dispatch_delay_ms = 0

            [captcha]
            backend = "anticaptcha"
            max_polls = 10
        "#;
        let config: CleanerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.dispatch_delay_ms, 0);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.captcha.backend, CaptchaBackend::AntiCaptcha);
        assert_eq!(config.captcha.max_polls, 10);
        assert_eq!(config.captcha.poll_interval_ms, 5000);
    }

    #[test]
    fn load_from_file_clamps_concurrency() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "concurrency = 16\nmax_attempts = 0").unwrap();

        let config = CleanerConfig::load_from(file.path()).unwrap();
        assert_eq!(config.concurrency, MAX_CONCURRENCY);
        assert_eq!(config.max_attempts, 1);
    }

    #[test]
    fn load_from_rejects_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "concurrency = \"many\"").unwrap();
        assert!(CleanerConfig::load_from(file.path()).is_err());
    }

    #[test]
    fn load_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CleanerConfig::load_from(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.max_pages, 100);
    }
}
