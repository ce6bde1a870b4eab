use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use rig::completion::Prompt;
use rig::prelude::*;
use rig::providers::gemini;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::QueryOrchestrator;
use crate::models::{QueryMetadata, QueryOutcome};

type GeminiAgent = rig::agent::Agent<gemini::completion::CompletionModel>;

const MODEL: &str = "gemini-2.5-flash";

const PREAMBLE: &str = "Você é um assistente de pesquisa jurídica especializado em \
direito brasileiro. Responda sempre em português, com precisão técnica.";

/// Research answers mark each supporting source with this prefix, one per
/// line.
const SOURCE_PREFIX: &str = "Fonte:";

/// Legal research engine backed by Gemini agents: derives research angles
/// from the question, investigates them concurrently, then composes the
/// final answer and a short summary from the findings.
pub struct GeminiOrchestrator {
    /// Planning and final composition.
    default_agent: GeminiAgent,
    /// Per-angle investigations, with a larger token budget.
    research_agent: GeminiAgent,
    output_dir: PathBuf,
}

impl GeminiOrchestrator {
    /// Builds both agent profiles from `GEMINI_API_KEY` and creates the
    /// artifact directory. Either step failing fails construction.
    pub fn from_env(output_dir: impl AsRef<Path>) -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow!("GEMINI_API_KEY não configurada"))?;
        let client = gemini::Client::new(&api_key);

        let default_agent = client
            .agent(MODEL)
            .preamble(PREAMBLE)
            .temperature(0.1)
            .max_tokens(4000)
            .build();
        let research_agent = client
            .agent(MODEL)
            .preamble(PREAMBLE)
            .temperature(0.1)
            .max_tokens(6000)
            .build();

        let output_dir = output_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&output_dir)
            .with_context(|| format!("criando diretório de respostas {}", output_dir.display()))?;

        Ok(Self {
            default_agent,
            research_agent,
            output_dir,
        })
    }

    async fn plan_angles(&self, pergunta: &str) -> Result<Vec<String>> {
        let prompt = format!(
            r#"Gere 2 a 3 perguntas de pesquisa específicas para responder a seguinte consulta jurídica: "{pergunta}"

Requisitos:
- Perguntas factuais, respondíveis com base na legislação, doutrina e jurisprudência brasileiras
- Cada pergunta deve cobrir um aspecto diferente da consulta
- Formato: apenas as perguntas, uma por linha, sem numeração"#
        );

        let response = self
            .default_agent
            .prompt(&prompt)
            .await
            .map_err(|e| anyhow!("Prompt error: {}", e))?;

        let angles = parse_angles(&response);
        if angles.is_empty() {
            return Err(anyhow!("o modelo não produziu perguntas de pesquisa"));
        }
        Ok(angles)
    }

    async fn research_angle(&self, pergunta: &str, angle: &str) -> Result<String> {
        debug!("researching angle: {angle}");
        let prompt = format!(
            r#"Pesquise a seguinte questão, no contexto da consulta "{pergunta}": "{angle}"

Requisitos:
- Responda com fatos objetivos: dispositivos legais, prazos, requisitos, entendimentos consolidados
- Liste cada base normativa ou jurisprudencial utilizada em uma linha própria iniciada por "Fonte:"
  (por exemplo: Fonte: Código Civil, art. 1.238)"#
        );
        self.research_agent
            .prompt(&prompt)
            .await
            .map_err(|e| anyhow!("Prompt error: {}", e))
    }

    async fn compose_answer(&self, pergunta: &str, findings: &[String]) -> Result<String> {
        let prompt = format!(
            r#"Elabore a resposta final para a consulta jurídica "{pergunta}" a partir do material de pesquisa abaixo:

{material}

Requisitos:
- Resposta em markdown bem estruturada, com fundamentação legal
- Inclua uma seção final "Fontes" listando as bases utilizadas
- Linguagem técnica, clara e profissional"#,
            material = findings.join("\n\n---\n\n")
        );
        self.default_agent
            .prompt(&prompt)
            .await
            .map_err(|e| anyhow!("Prompt error: {}", e))
    }

    async fn summarize(&self, pergunta: &str, resposta: &str) -> Result<String> {
        let prompt = format!(
            r#"Resuma em um parágrafo curto (3 a 5 frases) a resposta abaixo para a consulta "{pergunta}":

{resposta}

Não inclua citações nem formatação markdown no resumo."#
        );
        self.default_agent
            .prompt(&prompt)
            .await
            .map_err(|e| anyhow!("Prompt error: {}", e))
    }

    async fn write_artifact(&self, workflow_id: &str, pergunta: &str, resposta: &str) -> Result<()> {
        let path = self.output_dir.join(format!("{workflow_id}.md"));
        let contents = format!("# Consulta\n\n{pergunta}\n\n# Resposta\n\n{resposta}\n");
        tokio::fs::write(&path, contents)
            .await
            .with_context(|| format!("gravando resposta em {}", path.display()))?;
        debug!("answer artifact written to {}", path.display());
        Ok(())
    }
}

#[async_trait]
impl QueryOrchestrator for GeminiOrchestrator {
    #[instrument(skip(self, pergunta))]
    async fn process_query(&self, pergunta: &str) -> Result<QueryOutcome> {
        let angles = self.plan_angles(pergunta).await?;
        info!("researching {} angles", angles.len());

        let investigations =
            join_all(angles.iter().map(|angle| self.research_angle(pergunta, angle))).await;
        let findings: Vec<String> = investigations.into_iter().filter_map(|r| r.ok()).collect();
        let sources_found = count_sources(&findings);

        let resposta = self.compose_answer(pergunta, &findings).await?;
        let resumo = self.summarize(pergunta, &resposta).await?;

        let workflow_id = format!("wf_{}", Uuid::new_v4().simple());
        self.write_artifact(&workflow_id, pergunta, &resposta).await?;

        Ok(QueryOutcome {
            summary: Some(resumo),
            formatted_response: Some(resposta),
            sources_found: Some(sources_found),
            metadata: QueryMetadata {
                workflow_id: Some(workflow_id),
            },
        })
    }
}

fn parse_angles(response: &str) -> Vec<String> {
    response
        .lines()
        .map(|line| line.trim().trim_start_matches(['-', '*', ' ']).to_string())
        .filter(|line| !line.is_empty())
        .take(3)
        .collect()
}

/// Counts distinct `Fonte:` lines across all research answers.
fn count_sources(findings: &[String]) -> u32 {
    let mut seen = HashSet::new();
    for finding in findings {
        for line in finding.lines() {
            if let Some(source) = line.trim().strip_prefix(SOURCE_PREFIX) {
                seen.insert(source.trim().to_string());
            }
        }
    }
    seen.len() as u32
}
