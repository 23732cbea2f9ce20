//! Starter project used when a workspace has no files yet.

use crate::files::FileMap;

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <title>Vite + React</title>
  </head>
  <body>
    <div id="root"></div>
    <script type="module" src="/src/main.jsx"></script>
  </body>
</html>"#;

const VITE_CONFIG: &str = r#"import { defineConfig } from "vite";
import react from "@vitejs/plugin-react";
import path from "path";

export default defineConfig({
  plugins: [react()],
  resolve: {
    alias: {
      "@": path.resolve(__dirname, "src"),
    },
  },
});"#;

const POSTCSS_CONFIG: &str = r#"export default {
  plugins: {
    tailwindcss: {},
    autoprefixer: {},
  },
};"#;

const TAILWIND_CONFIG: &str = r#"export default {
  content: ["./index.html", "./**/*.{js,jsx}"],
  theme: {
    extend: {},
  },
  plugins: [],
};"#;

const PACKAGE_JSON: &str = r#"{
  "name": "vite-react-tailwind-app",
  "version": "1.0.0",
  "private": true,
  "scripts": {
    "dev": "vite",
    "build": "vite build",
    "preview": "vite preview"
  },
  "dependencies": {
    "react": "^18.2.0",
    "react-dom": "^18.2.0",
    "motion": "^12.19.2",
    "lucide-react": "^0.276.0",
    "tailwindcss": "^3.4.1",
    "autoprefixer": "^10.4.15",
    "postcss": "^8.4.24",
    "clsx": "^2.1.1"
  },
  "devDependencies": {
    "vite": "^5.2.0",
    "@vitejs/plugin-react": "^4.1.0"
  },
  "packageManager": "pnpm@8.15.4"
}"#;

const MAIN_JSX: &str = r#"import React from "react";
import ReactDOM from "react-dom/client";
import App from "./App";
import "./index.css";

ReactDOM.createRoot(document.getElementById("root")).render(
  <React.StrictMode>
    <App />
  </React.StrictMode>
);"#;

const APP_JSX: &str = r#"import { useState } from "react";
import { motion } from "motion/react";
import { Sun } from "lucide-react";

export default function App() {
  const [count, setCount] = useState(0);

  return (
    <motion.div
      initial={{ opacity: 0, y: 20 }}
      animate={{ opacity: 1, y: 0 }}
      className="min-h-screen flex flex-col items-center justify-center bg-gray-100 p-6"
    >
      <Sun className="text-blue-500 w-10 h-10 mb-4" />
      <h1 className="text-3xl font-bold text-gray-800 mb-4">Vite + React + Tailwind</h1>
      <button
        onClick={() => setCount((c) => c + 1)}
        className="bg-blue-500 text-white px-4 py-2 rounded hover:bg-blue-600"
      >
        Clicked {count} times
      </button>
    </motion.div>
  );
}"#;

const INDEX_CSS: &str = r#"@tailwind base;
@tailwind components;
@tailwind utilities;"#;

const DEFAULT_FILES: &[(&str, &str)] = &[
    ("/index.html", INDEX_HTML),
    ("/vite.config.js", VITE_CONFIG),
    ("/postcss.config.js", POSTCSS_CONFIG),
    ("/tailwind.config.js", TAILWIND_CONFIG),
    ("/package.json", PACKAGE_JSON),
    ("/src/main.jsx", MAIN_JSX),
    ("/src/App.jsx", APP_JSX),
    ("/src/index.css", INDEX_CSS),
];

/// Vite + React + Tailwind starter project
pub fn default_project() -> FileMap {
    // Template paths are already canonical
    FileMap::from_entries(DEFAULT_FILES.iter().copied()).unwrap_or_default()
}
