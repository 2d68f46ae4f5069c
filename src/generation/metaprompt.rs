//! Prompt texts sent to the model during generation.

/// Placeholder in [`METAPROMPT`] replaced by the task description.
pub const TASK_PLACEHOLDER: &str = "{{TASK}}";

/// Placeholder in [`REMOVE_FLOATING_VARIABLES_PROMPT`] replaced by the draft.
pub const PROMPT_PLACEHOLDER: &str = "{$PROMPT}";

/// Assistant prefill that opens the `<Inputs>` block with the requested
/// variables and hands over at `<Instructions Structure>`.
pub fn assistant_prefill(variables: &[String]) -> String {
    let mut prefill = String::from("<Inputs>");
    for variable in variables {
        prefill.push_str("\n{$");
        prefill.push_str(variable);
        prefill.push('}');
    }
    prefill.push_str("\n</Inputs>\n<Instructions Structure>");
    prefill
}

/// First-pass instructions: turn a task into a variable-parameterized template.
pub const METAPROMPT: &str = r#"Today you will be writing instructions to an eager, helpful, but inexperienced and unworldly AI assistant who needs careful instruction and examples to understand how best to behave. I will explain a task to you. You will write instructions that will direct the assistant on how best to accomplish the task consistently, accurately, and correctly.

Here is an example of a task and the instructions written for it:

<Task Instruction Example>
<Task>
Act as a polite customer success agent for Acme Dynamics. Use FAQ to answer questions.
</Task>
<Inputs>
{$FAQ}
{$QUESTION}
</Inputs>
<Instructions Structure>
First the FAQ document is shown inside tags. Then the customer question is shown inside tags. Then the assistant is told how to answer, and finally told to write its answer inside answer tags.
</Instructions Structure>
<Instructions>
You will be acting as an AI customer success agent for a company called Acme Dynamics. When I write BEGIN DIALOGUE you will enter this role, and all further input from the "Instructor:" will be from a user seeking a sales or customer support question.

Here is the FAQ you should use to answer questions:
<FAQ>
{$FAQ}
</FAQ>

Here is the customer's question:
<question>
{$QUESTION}
</question>

Please adhere to the following guidelines:
- Only answer questions that are covered in the FAQ. If the question is not covered, say that you do not know and suggest contacting support.
- Stay polite and professional at all times.
- Never make up facts that are not in the FAQ.

Write your answer inside <answer></answer> tags.
</Instructions>
</Task Instruction Example>

That concludes the example. Now, here is the task for which I would like you to write instructions:

<Task>
{{TASK}}
</Task>

To write your instructions, follow THESE instructions:
1. In <Inputs> tags, write down the barebones, minimal, nonoverlapping set of text input variable(s) the instructions will make reference to. (These are variable names, not specific instructions.) Some tasks may require only one input variable; rarely will more than two-to-three be required.
2. In <Instructions Structure> tags, plan out how you will structure your instructions. In particular, plan where you will include each variable. Remember, input variables expected to take on lengthy values should come BEFORE directions on what to do with them.
3. Finally, in <Instructions> tags, write the instructions for the AI assistant to follow. These instructions should be similarly structured as the ones in the example above.

Note: This is probably obvious to you already, but you are not *completing* the task here. You are writing instructions for an AI to complete the task.
Note: Another name for what you are writing is a "prompt template". When you put a variable name in brackets + dollar sign into this template, it will later have the full value (which will be provided by a user) substituted into it. This only needs to happen once for each variable. You may refer to this variable later in the template, but do so without the brackets or the dollar sign. Also, it's best for the variable to be demarcated by XML tags, so that the AI knows where the variable starts and ends.
Note: When instructing the AI to provide an output (e.g. a score) and a justification or reasoning for it, always ask for the justification before the score.
Note: If the task is particularly complicated, you may wish to instruct the AI to think things out beforehand in scratchpad or inner monologue XML tags before it gives its final answer. For simple tasks, omit this.
Note: If you want the AI to output its entire response or parts of its response inside certain tags, specify the name of these tags (e.g. "write your answer inside <answer> tags") but do not include closing tags or unnecessary open-and-close tag sections."#;

/// Second-pass instructions: wrap or remove variables that float outside tags.
pub const REMOVE_FLOATING_VARIABLES_PROMPT: &str = r#"I will give you a prompt template with one or more usages of variables (capitalized words between curly braces with a dollar sign). Some of these usages are erroneous and should be replaced with the unadorned variable name (possibly with minor cosmetic changes to the sentence). What does it mean for a usage to be "erroneous"? It means that when the variable is replaced by its actual value, the sentence would be ungrammatical, nonsensical, or otherwise inappropriate.

For example, take this prompt:

<example_prompt>
You are an AI assistant that specializes in helping users grade essays. You will be provided with an essay written by a student. Your task is to carefully review the {$ESSAY} and provide a score and feedback.

Here is the essay you will be grading:

<essay>
{$ESSAY}
</essay>
</example_prompt>

Here, the first usage of {$ESSAY} is erroneous, because the full essay would be substituted into the middle of a sentence. The second usage is correct, because the essay is demarcated by tags.

Here is the prompt template you should review:

<prompt>
{$PROMPT}
</prompt>

First, in <explanation> tags, go through each variable usage outside of XML tags and say whether it is erroneous and why. Then, in <rewritten_prompt> tags, write the full prompt template with every erroneous usage fixed and everything else left exactly as it was. If there are no erroneous usages, write only "No changes." inside the <rewritten_prompt> tags."#;
