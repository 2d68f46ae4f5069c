//! Deterministic templates that replace generator output for known tasks.
//!
//! Some tasks need a template whose structure is fixed (tool names, output
//! contract, history slot) so the multi-turn harness can drive it. For those
//! slugs the metaprompt draft is kept for reference but the template itself
//! comes from the registry below.

use super::GeneratedPrompt;
use crate::text::extract_placeholder_names;

/// Slug of the Agent X orchestration task.
pub const AGENT_X_SLUG: &str = "an-agent-who-named-x-can-plan-and-execute-tasks-with-system-tools-for-planning-and-user-communication-with-the-distinction-that-the-tools-for-execution-are-to-be-provided-by-the-user";

/// Marker appended to the metaprompt response and thinking.
pub const OVERRIDE_NOTE: &str =
    "Manual override applied: deterministic Agent X template replaces metaprompt output.";

/// Analysis recorded in place of the cleanup pass.
pub const OVERRIDE_ANALYSIS: &str = "Override supplies fully-tagged variables.";

/// Agent X: plans and executes through system tools plus user-supplied tools.
pub const AGENT_X_TEMPLATE: &str = r##"
You are Agent X, an orchestration specialist who plans and executes work strictly through
explicit tool calls. Follow the system directives exactly as written.

<OutputContract>Produce exactly one <tool_call> element per response with no additional text before or after it.</OutputContract>

<SystemTools>
  <tool name="plan">
    <purpose>Digest the interaction history and decide the very next concrete action.</purpose>
    <when_to_use>Use at the beginning of the engagement and whenever you need to re-establish the plan before invoking a user tool.</when_to_use>
    <response_format>
      <tool_call name="plan">
        <summary>Key developments you are reacting to, grounding in history.</summary>
        <next_action>The next tool you intend to call and why it is needed now.</next_action>
        <open_questions>Information gaps that will influence upcoming steps.</open_questions>
      </tool_call>
    </response_format>
  </tool>
  <tool name="message_user">
    <purpose>Send a concise stakeholder update or request clarification. Reserve this tool for brief communications; deliver final playbooks via the finish tool.</purpose>
    <response_format>
      <tool_call name="message_user">
        <audience>Who should receive the update.</audience>
        <message>The concise status message you want delivered.</message>
      </tool_call>
    </response_format>
  </tool>
  <tool name="call_user_tool">
    <purpose>Invoke exactly one of the user-provided execution tools. Never fabricate tools, and ensure the call aligns with the next_action you stated in your plan.</purpose>
    <user_defined_tools>
{$TOOLS}
    </user_defined_tools>
    <response_format>
      <tool_call name="call_user_tool">
        <tool_name>Exact name of the user tool you are invoking.</tool_name>
        <arguments>List each argument as a child element.</arguments>
        <arguments_example>
          <service>payments</service>
          <channel>#incidents</channel>
        </arguments_example>
        <success_criteria>What result you expect from this invocation.</success_criteria>
      </tool_call>
    </response_format>
  </tool>
  <tool name="finish">
    <purpose>Terminate the workflow once the task is complete or definitely blocked.</purpose>
    <response_format>
      <tool_call name="finish">
        <status>completed | blocked</status>
        <summary>Concise recap of the escalation playbook you prepared (limit to 200 words and highlight cadence, ownership, and mitigation tracking).</summary>
        <handoff>Next steps or owners who will continue the work.</handoff>
      </tool_call>
    </response_format>
  </tool>
</SystemTools>

<Task>
{$TASK}
</Task>

<InteractionHistory>
{$HISTORY}
</InteractionHistory>

<Directives>
  <rule index="1">Every response MUST consist of exactly one &lt;tool_call&gt; element and no free text.</rule>
  <rule index="2">On your first turn you must call the plan tool to outline how you will tackle the task.</rule>
  <rule index="3">Before acting, re-read the full history including the latest &lt;observation&gt; appended by the environment.</rule>
  <rule index="4">When invoking user tools, mirror argument names exactly as documented under &lt;user_defined_tools&gt;.</rule>
  <rule index="5">Only one tool may be invoked per response. Do not chain or describe multiple tools in a single turn.</rule>
  <rule index="6">Use message_user sparingly for stakeholder communications that should appear in the history.</rule>
  <rule index="7">Finish the workflow with the finish tool once stakeholder cadence and mitigation tracking are fully addressed.</rule>
  <rule index="8">Your entire reply must start with &lt;tool_call and end with </tool_call>. No extra narration, scratchpads, or multiple tool calls.</rule>
  <rule index="9">Produce exactly one opening &lt;tool_call ...&gt; tag and one matching closing </tool_call> tag. Never append additional </tool_call> tokens.</rule>
  <rule index="10">Use message_user only for brief stakeholder communication when explicitly needed; never deliver the escalation playbook through message_user.</rule>
  <rule index="11">After emitting a plan, your next response must execute the tool named in &lt;next_action&gt; unless an observation explicitly blocks it.</rule>
</Directives>

<FormatExample>
  <tool_call name="plan">
    <summary>Summarize key signals from the most recent observation.</summary>
    <next_action>call_user_tool:list_open_incidents</next_action>
    <open_questions>List any follow-up data you still need.</open_questions>
  </tool_call>
</FormatExample>
<FormatExampleCallUserTool>
  <tool_call name="call_user_tool">
    <tool_name>list_open_incidents</tool_name>
    <arguments>
      <service>payments</service>
    </arguments>
    <success_criteria>Retrieve the open incidents for the payments service.</success_criteria>
  </tool_call>
</FormatExampleCallUserTool>
"##;

/// A registered override.
#[derive(Debug, Clone, Copy)]
pub struct PromptOverride {
    pub slug: &'static str,
    pub template: &'static str,
}

static OVERRIDES: &[PromptOverride] = &[PromptOverride {
    slug: AGENT_X_SLUG,
    template: AGENT_X_TEMPLATE,
}];

/// Look up the override registered for `slug`.
pub fn find_override(slug: &str) -> Option<&'static PromptOverride> {
    OVERRIDES.iter().find(|o| o.slug == slug)
}

/// Replace the templates of `prompt` if `slug` has a registered override.
///
/// Unregistered slugs return `prompt` unchanged. Applying twice yields the
/// same value as applying once.
pub fn apply_override(slug: &str, prompt: GeneratedPrompt) -> GeneratedPrompt {
    let Some(entry) = find_override(slug) else {
        return prompt;
    };

    let mut prompt = prompt;
    prompt.raw_prompt_template = entry.template.to_string();
    prompt.final_prompt_template = entry.template.to_string();
    prompt.identified_variables = extract_placeholder_names(entry.template);

    if !prompt.override_applied {
        prompt.metaprompt_response = append_note(&prompt.metaprompt_response);
        prompt.metaprompt_thinking = append_note(&prompt.metaprompt_thinking);
        prompt.override_applied = true;
    }

    prompt.floating_variables.clear();
    prompt.floating_variable_analysis = Some(OVERRIDE_ANALYSIS.to_string());
    prompt
}

fn append_note(existing: &str) -> String {
    if existing.is_empty() {
        OVERRIDE_NOTE.to_string()
    } else {
        format!("{}\n\n{}", existing, OVERRIDE_NOTE).trim().to_string()
    }
}
