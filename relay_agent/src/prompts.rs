//! Routing prompt templates.

pub use relay_runtime::prompts::render;

pub const TASK_DECOMPOSITION_PROMPT: &str = r#"You are a task decomposition expert. Break down the user's request into smaller, manageable tasks.

User Request: {user_request}

Available Agents: {available_agents}

Analyze the request and decompose it into tasks. Each task should be:
- Clear and specific
- Assignable to one agent
- Independent or properly sequenced

A task may refer to the output of an earlier task as {step_N_output}, where N is that task's number.

Example:
User Request: "Analyze sales data and create a report with visualizations"
Tasks:
1. Load and validate sales data
2. Perform statistical analysis
3. Create data visualizations
4. Generate report document

Output your tasks as a numbered list."#;

pub const AGENT_SELECTION_PROMPT: &str = r#"Select the most appropriate agent for the given task.

Task: {task}

Available Agents:
{agents_description}

Consider:
- Agent capabilities
- Task requirements

If no further work is needed for this task, answer "Agent: None".

Example:
Task: "Analyze customer sentiment from reviews"
Agents: [DataAgent: handles data processing, NLPAgent: handles text analysis]
Selected: NLPAgent
Reason: Task requires natural language processing capabilities

Output:
Agent: [agent_name]
Reason: [brief explanation]"#;
