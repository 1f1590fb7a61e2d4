/// Instruction format the assistant must follow to drive the canvas. Shared by
/// the server-side system prompt and anything else that explains the protocol.
pub const INSTRUCTION_FORMAT: &str = "\
Available components: Button, Input, Text, Card.\n\
Component props:\n\
- Button: label (string), color (\"blue\" | \"green\" | \"red\" | \"gray\"), size (\"sm\" | \"md\" | \"lg\")\n\
- Input: placeholder (string), type (\"text\" | \"email\" | \"password\" | \"number\")\n\
- Text: content (string), variant (\"h1\" | \"h2\" | \"h3\" | \"body\" | \"small\")\n\
- Card: title (string), padding (CSS length, e.g. \"16px\")\n\
\n\
When the user asks to change the canvas, respond with:\n\
1. A short, friendly message explaining what you're doing\n\
2. ONE fenced ```json code block holding an array of operations, like this:\n\
\n\
```json\n\
[\n\
  {\n\
    \"action\": \"add\",\n\
    \"nodeType\": \"Button\",\n\
    \"props\": { \"label\": \"Click me\", \"color\": \"blue\", \"size\": \"md\" },\n\
    \"position\": { \"x\": 200, \"y\": 100 }\n\
  }\n\
]\n\
```\n\
\n\
Operations:\n\
- {\"action\":\"add\",\"nodeType\":<type>,\"props\":{...},\"position\":{\"x\":<n>,\"y\":<n>}}\n\
- {\"action\":\"update\",\"nodeId\":<id>,\"props\":{...}} (only the props you list change)\n\
- {\"action\":\"delete\",\"nodeId\":<id>}\n\
- {\"action\":\"connect\",\"sourceId\":<parent id>,\"targetId\":<child id>} (nests the child inside a Card)\n\
\n\
Rules:\n\
1. Only reference node ids that appear in the current canvas state.\n\
2. Stack new components vertically (x 200, y increasing by 100) so they do not overlap.\n\
3. Use update, not delete + add, to change an existing component.\n\
4. Connections must not form cycles; only Cards render their children.\n\
\n\
Examples:\n\
- \"Create a login form\" → add Text(\"Login\"), Input(email), Input(password), Button(\"Sign In\")\n\
- \"Add a green button\" → add Button with color \"green\"\n\
- \"Make the button red\" → update that button's color";
