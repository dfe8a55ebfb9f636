// Copyright 2025 CloudWeGo Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use paste::paste;

use crate::config::Language;
use crate::parse::FunctionRecord;
use crate::utils::errors::Error;

// choose the prompt based on the language
macro_rules! choose_prompt_lang {
    ($lang: expr, $prompt: ident) => {
        //  return const {{$prompt}}_EN or {{$prompt}}_PT
        match $lang {
            Language::English => paste! { [<$prompt _EN>] },
            Language::Portuguese => paste! { [<$prompt _PT>] },
        }
    };
}

const SEPARATOR_WIDTH: usize = 50;

/// Fills `{{KEY}}` placeholders in a single left-to-right pass, so substituted
/// values are never scanned again. Unknown keys are left as they are.
fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let value = after.find("}}").and_then(|close| {
            let key = &after[..close];
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v, close))
        });
        match value {
            Some((v, close)) => {
                out.push_str(v);
                rest = &after[close + 2..];
            }
            None => {
                out.push_str("{{");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn function_block(record: &FunctionRecord, lang: Language) -> String {
    let documentation = match record.documentation() {
        "" => choose_prompt_lang!(lang, UNDOCUMENTED),
        doc => doc,
    };
    let line = record.line_number().to_string();
    let signature = record.signature();
    render(
        choose_prompt_lang!(lang, FUNCTION_BLOCK),
        &[
            ("NAME", record.name()),
            ("SIGNATURE", &signature),
            ("LINE", &line),
            ("DOC", documentation),
            ("SOURCE", record.source_text()),
        ],
    )
    .trim()
    .to_string()
}

// first occurrence wins, so a redefined function is imported once
fn import_names(records: &[FunctionRecord]) -> String {
    let mut names: Vec<&str> = vec![];
    for record in records {
        if !names.contains(&record.name()) {
            names.push(record.name());
        }
    }
    names.join(", ")
}

/// Renders the test-generation prompt in English.
pub fn build_prompt(
    module_name: &str,
    records: &[FunctionRecord],
    full_source: &str,
) -> Result<String, Error> {
    build_prompt_in(Language::English, module_name, records, full_source)
}

/// Renders the test-generation prompt for `records`.
///
/// Pure: the same inputs always give the same bytes. An empty `records` is
/// refused since the template is meaningless without functions.
pub fn build_prompt_in(
    lang: Language,
    module_name: &str,
    records: &[FunctionRecord],
    full_source: &str,
) -> Result<String, Error> {
    if records.is_empty() {
        return Err(Error::NoFunctionsFound);
    }

    let separator = "=".repeat(SEPARATOR_WIDTH);
    let functions_info = records
        .iter()
        .map(|r| format!("{separator}\n{}", function_block(r, lang)))
        .collect::<Vec<_>>()
        .join("\n\n");
    let count = records.len().to_string();
    let imports = import_names(records);

    Ok(render(
        choose_prompt_lang!(lang, PROMPT_TEST_SUITE),
        &[
            ("MODULE_NAME", module_name),
            ("FUNCTION_COUNT", &count),
            ("FUNCTION_NAMES", &imports),
            ("FUNCTIONS_INFO", &functions_info),
            ("CODE", full_source),
        ],
    ))
}

/// Form fields of a threat-model request, already decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreatContext<'a> {
    pub application_type: &'a str,
    pub authentication: &'a str,
    pub internet_facing: &'a str,
    pub sensitive_data: &'a str,
    pub description: &'a str,
}

pub fn make_threat_prompt(lang: Language, ctx: &ThreatContext) -> String {
    render(
        choose_prompt_lang!(lang, PROMPT_THREAT_MODEL),
        &[
            ("APPLICATION_TYPE", ctx.application_type),
            ("AUTHENTICATION", ctx.authentication),
            ("INTERNET_FACING", ctx.internet_facing),
            ("SENSITIVE_DATA", ctx.sensitive_data),
            ("DESCRIPTION", ctx.description),
        ],
    )
}

pub fn threat_system_prompt(lang: Language) -> &'static str {
    choose_prompt_lang!(lang, THREAT_SYSTEM)
}

pub fn threat_closing_prompt(lang: Language) -> &'static str {
    choose_prompt_lang!(lang, THREAT_CLOSING)
}

pub fn connection_probe(lang: Language) -> &'static str {
    choose_prompt_lang!(lang, CONNECTION_PROBE)
}

const UNDOCUMENTED_EN: &str = "Not documented";
const UNDOCUMENTED_PT: &str = "Não documentada";

const CONNECTION_PROBE_EN: &str = "Reply only: Connection OK!";
const CONNECTION_PROBE_PT: &str = "Responda apenas: Conexão OK!";

const FUNCTION_BLOCK_EN: &str = r##"
FUNCTION: {{NAME}}
├── Signature: {{SIGNATURE}}
├── Line: {{LINE}}
├── Docstring: {{DOC}}
└── Code:
{{SOURCE}}
"##;

const FUNCTION_BLOCK_PT: &str = r##"
FUNÇÃO: {{NAME}}
├── Assinatura: {{SIGNATURE}}
├── Linha: {{LINE}}
├── Docstring: {{DOC}}
└── Código:
{{SOURCE}}
"##;

const PROMPT_TEST_SUITE_EN: &str = r##"You are a Python testing expert who writes professional, thorough pytest files.

GOAL: write a complete, well-structured pytest test file.

MANDATORY RULES:
1. START: the file must begin exactly with 'import pytest'
2. IMPORTS: import the functions with: from {{MODULE_NAME}} import {{FUNCTION_NAMES}}
3. TESTS: for every function, write:
   - success cases (valid inputs)
   - invalid inputs (exceptions or errors)
   - edge cases
4. ORGANIZATION: use @pytest.mark.parametrize whenever possible
5. NAMES: name every test test_<function>_<scenario>
6. COVERAGE: exercise different input and output types

TEST LAYOUT FOR EACH FUNCTION:
- test_<function>_success_cases: inputs that must work
- test_<function>_invalid_inputs: inputs that must raise
- test_<function>_edge_cases: boundary values

MODULE INFORMATION:
Module name: {{MODULE_NAME}}
Number of functions: {{FUNCTION_COUNT}}

FUNCTION DETAILS:
{{FUNCTIONS_INFO}}

FULL MODULE SOURCE:
```python
{{CODE}}
```

ANSWER: output ONLY the content of test_{{MODULE_NAME}}.py, without explanations:"##;

const PROMPT_TEST_SUITE_PT: &str = r##"Você é especialista em testes Python e escreve arquivos pytest profissionais e completos.

OBJETIVO: escrever um arquivo de testes pytest completo e bem estruturado.

REGRAS OBRIGATÓRIAS:
1. INÍCIO: o arquivo deve começar exatamente com 'import pytest'
2. IMPORTS: importe as funções com: from {{MODULE_NAME}} import {{FUNCTION_NAMES}}
3. TESTES: para cada função, escreva:
   - casos de sucesso (entradas válidas)
   - entradas inválidas (exceções ou erros)
   - casos extremos (edge cases)
4. ORGANIZAÇÃO: use @pytest.mark.parametrize sempre que possível
5. NOMES: nomeie cada teste como test_<função>_<cenário>
6. COBERTURA: teste diferentes tipos de entrada e saída

ESTRUTURA DOS TESTES DE CADA FUNÇÃO:
- test_<função>_success_cases: entradas que devem funcionar
- test_<função>_invalid_inputs: entradas que devem gerar erro
- test_<função>_edge_cases: valores limite

INFORMAÇÕES DO MÓDULO:
Nome do módulo: {{MODULE_NAME}}
Número de funções: {{FUNCTION_COUNT}}

DETALHES DAS FUNÇÕES:
{{FUNCTIONS_INFO}}

CÓDIGO COMPLETO DO MÓDULO:
```python
{{CODE}}
```

RESPOSTA: gere APENAS o conteúdo do arquivo test_{{MODULE_NAME}}.py, sem explicações:"##;

const THREAT_SYSTEM_EN: &str =
    "You are a cybersecurity expert AI that analyzes architecture diagrams.";
const THREAT_SYSTEM_PT: &str =
    "Você é uma IA especialista em cibersegurança que analisa desenhos de arquitetura.";

const THREAT_CLOSING_EN: &str =
    "Please analyze the image and the text above and provide a detailed threat model.";
const THREAT_CLOSING_PT: &str =
    "Por favor, analise a imagem e o texto acima e forneça um modelo de ameaças detalhado.";

const PROMPT_THREAT_MODEL_EN: &str = r##"You are a very experienced cybersecurity expert applying the STRIDE threat modeling methodology to produce comprehensive threat models for a wide range of applications. Analyze the code summary, README content and application description provided below and produce a list of threats specific to this application.

Pay close attention to the application description and the technical details provided.

For each STRIDE category (Spoofing, Tampering, Repudiation, Information Disclosure, Denial of Service and Elevation of Privilege), list several (3 or 4) credible threats when applicable. Each threat scenario must describe a plausible situation in which the threat could occur in the context of this application.

Answer with a JSON object with the keys "threat_model" and "improvement_suggestions".
"threat_model" is an array of objects with the keys "Threat Type", "Scenario" and "Potential Impact".
"improvement_suggestions" is an array of strings describing which additional information would make the next iteration of the threat model more complete and precise, for example:
- missing architectural details that would reveal more specific threats
- unclear authentication flows
- incomplete data flow descriptions
- unstated technology stack details
- unspecified trust boundaries or zones
- incomplete description of sensitive data handling
Do not give generic security recommendations; focus only on what would help build a better threat model.

APPLICATION TYPE: {{APPLICATION_TYPE}}
AUTHENTICATION METHODS: {{AUTHENTICATION}}
INTERNET FACING: {{INTERNET_FACING}}
SENSITIVE DATA: {{SENSITIVE_DATA}}
CODE SUMMARY, README CONTENT AND APPLICATION DESCRIPTION: {{DESCRIPTION}}

Expected JSON format:

{
  "threat_model": [
    {
      "Threat Type": "Spoofing",
      "Scenario": "Example scenario 1",
      "Potential Impact": "Example potential impact 1"
    }
  ],
  "improvement_suggestions": [
    "Describe the authentication flow between components to allow a better analysis of authentication weaknesses."
  ]
}"##;

const PROMPT_THREAT_MODEL_PT: &str = r##"Você é um especialista em cibersegurança muito experiente e aplica a metodologia STRIDE para produzir modelos de ameaças abrangentes para uma ampla gama de aplicações. Analise o resumo do código, o conteúdo do README e a descrição da aplicação fornecidos abaixo e produza uma lista de ameaças específicas para esta aplicação.

Preste atenção na descrição da aplicação e nos detalhes técnicos fornecidos.

Para cada categoria do STRIDE (Spoofing, Tampering, Repudiation, Information Disclosure, Denial of Service e Elevation of Privilege), liste várias (3 ou 4) ameaças reais quando aplicável. Cada cenário deve descrever uma situação plausível em que a ameaça poderia ocorrer no contexto desta aplicação.

Responda com um objeto JSON com as chaves "threat_model" e "improvement_suggestions".
"threat_model" é um array de objetos com as chaves "Threat Type", "Scenario" e "Potential Impact".
"improvement_suggestions" é um array de strings indicando quais informações adicionais tornariam a próxima iteração do modelo de ameaças mais completa e precisa, por exemplo:
- detalhes arquiteturais ausentes que revelariam ameaças mais específicas
- fluxos de autenticação pouco claros
- descrição incompleta dos fluxos de dados
- informações da stack tecnológica não informadas
- fronteiras ou zonas de confiança não especificadas
- descrição incompleta do tratamento de dados sensíveis
Não forneça recomendações de segurança genéricas; foque apenas no que ajudaria a criar um modelo de ameaças melhor.

TIPO DE APLICAÇÃO: {{APPLICATION_TYPE}}
MÉTODOS DE AUTENTICAÇÃO: {{AUTHENTICATION}}
EXPOSTA NA INTERNET: {{INTERNET_FACING}}
DADOS SENSÍVEIS: {{SENSITIVE_DATA}}
RESUMO DE CÓDIGO, CONTEÚDO DO README E DESCRIÇÃO DA APLICAÇÃO: {{DESCRIPTION}}

Formato JSON esperado:

{
  "threat_model": [
    {
      "Threat Type": "Spoofing",
      "Scenario": "Cenário de exemplo 1",
      "Potential Impact": "Impacto potencial de exemplo 1"
    }
  ],
  "improvement_suggestions": [
    "Descreva o fluxo de autenticação entre os componentes para permitir uma análise melhor de falhas de autenticação."
  ]
}"##;

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parse::extract;

    const ADD_SUB: &str = "def add(a, b):\n    \"\"\"Adds two numbers\"\"\"\n    return a + b\n\n\ndef sub(a, b):\n    return a - b\n";

    #[test]
    fn render_single_pass() {
        assert_eq!(render("{{A}}-{{B}}", &[("A", "{{B}}"), ("B", "2")]), "{{B}}-2");
        assert_eq!(render("{{X}} {{ open", &[("A", "1")]), "{{X}} {{ open");
        assert_eq!(render("{}", &[]), "{}");
    }

    #[test]
    fn empty_records_are_refused() {
        assert!(matches!(
            build_prompt("mod", &[], "def f(): pass"),
            Err(Error::NoFunctionsFound)
        ));
        assert!(matches!(
            build_prompt_in(Language::Portuguese, "mod", &[], ""),
            Err(Error::NoFunctionsFound)
        ));
    }

    #[test]
    fn prompt_is_deterministic() {
        let records = extract(ADD_SUB).unwrap();
        let a = build_prompt("calc", &records, ADD_SUB).unwrap();
        let b = build_prompt("calc", &records.clone(), ADD_SUB).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn prompt_contents() {
        let records = extract(ADD_SUB).unwrap();
        let prompt = build_prompt("calc", &records, ADD_SUB).unwrap();

        assert!(prompt.contains("'import pytest'"));
        assert!(prompt.contains("test_<function>_<scenario>"));
        assert!(prompt.contains("success cases"));
        assert!(prompt.contains("invalid inputs"));
        assert!(prompt.contains("edge cases"));
        assert!(prompt.contains("from calc import add, sub"));
        assert!(prompt.contains("Module name: calc\nNumber of functions: 2"));
        assert!(prompt.contains("test_calc.py"));
        assert!(prompt.contains(&format!("```python\n{ADD_SUB}\n```")));

        let add = prompt.find("FUNCTION: add").unwrap();
        let sub = prompt.find("FUNCTION: sub").unwrap();
        assert!(add < sub);
        assert!(prompt.contains("├── Signature: add(a, b)\n├── Line: 1\n├── Docstring: Adds two numbers"));
        assert!(prompt.contains("├── Signature: sub(a, b)\n├── Line: 6\n├── Docstring: Not documented"));
        assert!(prompt.contains("└── Code:\ndef sub(a, b):\n    return a - b"));
    }

    #[test]
    fn function_block_layout() {
        let records = extract("def f(x):\n    return x").unwrap();
        assert_eq!(
            function_block(&records[0], Language::English),
            "FUNCTION: f\n├── Signature: f(x)\n├── Line: 1\n├── Docstring: Not documented\n└── Code:\ndef f(x):\n    return x"
        );
    }

    #[test]
    fn source_placeholders_are_not_expanded() {
        let code = "def f():\n    return '{{CODE}} {{MODULE_NAME}}'\n";
        let records = extract(code).unwrap();
        let prompt = build_prompt("m", &records, code).unwrap();
        assert_eq!(prompt.matches("return '{{CODE}} {{MODULE_NAME}}'").count(), 2);
    }

    #[test]
    fn portuguese_prompt() {
        let records = extract(ADD_SUB).unwrap();
        let prompt = build_prompt_in(Language::Portuguese, "calc", &records, ADD_SUB).unwrap();
        assert!(prompt.contains("Número de funções: 2"));
        assert!(prompt.contains("Docstring: Não documentada"));
        assert!(prompt.contains("'import pytest'"));
    }

    #[test]
    fn threat_prompt_fields() {
        let ctx = ThreatContext {
            application_type: "Web",
            authentication: "OAuth2",
            internet_facing: "Yes",
            sensitive_data: "PII",
            description: "Online store",
        };
        let prompt = make_threat_prompt(Language::English, &ctx);
        assert!(prompt.contains("APPLICATION TYPE: Web\n"));
        assert!(prompt.contains("AUTHENTICATION METHODS: OAuth2\n"));
        assert!(prompt.contains("SENSITIVE DATA: PII\n"));
        assert!(prompt.contains("Online store"));
        assert!(prompt.contains("\"threat_model\""));
        assert!(!prompt.contains("{{"));
    }
}
