use draftly_core::FileMap;

pub const SYSTEM_PROMPT: &str =
    "You generate React projects and answer with a single JSON object, never prose.";

/// Shown in place of the project listing when there are no files yet
pub const EMPTY_PROJECT_PLACEHOLDER: &str =
    "(For new projects, this section will contain the basic starter template.)";

const GUIDELINES: &str = r#"You are an expert coding assistant for a modern React (Vite) project.
Generate clean, responsive and accessible UIs using current React and Tailwind CSS practice.
The whole JSON response must stay under 120,000 characters.

Guidelines:
- /src/App.jsx is the main app component and /src/main.jsx renders it.
- Style with Tailwind CSS; use lucide-react for icons.
- Use framer-motion for animations where helpful, imported as: import { motion } from "motion/react"
- Keep package.json dependencies limited to what the project actually uses.
- Plain JavaScript only: no TypeScript, no Next.js, no /pages directory.
- Do not place files in a public folder unless asked to.
- Include only files that are new or changed, each with its full path and full code.

Your response MUST be valid JSON. Start with { and end with }. Do not write anything before or after it."#;

const RESPONSE_FORMAT: &str = r#"Respond ONLY with JSON in exactly this shape:

{
  "description": "<description of the project or changes>",
  "files": {
    "/src/App.jsx": { "code": "<full code>" },
    "/src/components/SomeComponent.jsx": { "code": "<full code>" }
  },
  "generated_files": [
    "/src/components/SomeComponent.jsx"
  ]
}"#;

/// Render the code-generation prompt for the current project and a user request
pub fn build_code_prompt(files: &FileMap, request: &str) -> String {
    let project = if files.is_empty() {
        EMPTY_PROJECT_PLACEHOLDER.to_string()
    } else {
        files
            .iter()
            .map(|(path, record)| format!("{}\n{}\n", path, record.code))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let mut prompt = String::with_capacity(
        GUIDELINES.len() + project.len() + request.len() + RESPONSE_FORMAT.len() + 96,
    );
    prompt.push_str(GUIDELINES);
    prompt.push_str("\n\nHere is the current state of my project:\n");
    prompt.push_str(&project);
    prompt.push_str("\n\nMy request: ");
    prompt.push_str(request.trim());
    prompt.push_str("\n\n");
    prompt.push_str(RESPONSE_FORMAT);
    prompt
}
