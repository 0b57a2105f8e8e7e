//! Prompts for planning, code generation and repair

pub const CODE_SYSTEM_PROMPT: &str = r#"You are a JSON generator for automated test projects.
You MUST output ONLY one valid JSON object. No markdown, no explanations, no code fences.
The root object has exactly one key: "directory_structure".
Its value is a nested object: keys ending with "/" are directories (objects), every other key is a file whose value is the full file content as a string.
All paths and file names are English snake_case.
The project must run with a single command: pytest --alluredir=<report dir>"#;

pub const REPAIR_PROMPT: &str = r#"The tests in the directory structure below fail when run.
Find and fix the errors. Pay close attention to imports, empty directories and the exact names of functions and classes.
Return ONLY a JSON object with the corrected contents of all directories and files, keeping the same overall shape.
The root of the JSON object MUST contain the key "directory_structure"."#;

pub fn ui_plan_prompt(url: &str, requirement: &str, page_html: &str) -> String {
    format!(
        r#"Write a detailed test plan for a web page according to the following requirement: {requirement}

URL of the page under test: {url}

HTML of the page under test:
{page_html}

Return the plan as markdown."#
    )
}

pub fn api_plan_prompt(
    base_endpoint: &str,
    contract: &str,
    token: Option<&str>,
    requirement: &str,
) -> String {
    let token = token.unwrap_or("not provided");
    format!(
        r#"You are an expert in manual REST API testing. You receive:
1. base_endpoint: the base URL of the API under test
2. open_api: the relevant part of the OpenAPI document for the endpoints under test
3. token: a bearer token for authorization, if required
4. text: a short description of the task and the testing requirements

Write a detailed, structured plan of manual test cases suitable for later automation:
- Every case follows Arrange / Act / Assert
- Every case carries a unique ID (e.g. TC_API_USERS_01), a title, a priority (high, medium, low) and an epic or feature
- Cover positive scenarios, missing or invalid parameters, wrong data types, boundary values, invalid formats and authorization failures
- Check HTTP status codes, the JSON response schema and the business rules stated in the requirements
- Use only endpoints, parameters and schemas present in open_api
- Build full URLs from base_endpoint
- Include error cases for 400, 401, 403, 404, 422 where relevant
- State prerequisites (e.g. a created resource) in the Arrange step

Return the plan as markdown.

Base endpoint: {base_endpoint}
OpenAPI document:
{contract}
Token: {token}
Requirements: {requirement}"#
    )
}

pub fn ui_code_prompt() -> String {
    format!(
        r#"{CODE_SYSTEM_PROMPT}

You receive a test plan and the HTML of the page under test.
Generate fully working automated tests with Playwright, pytest and allure-pytest.
- Use the page object model: every distinct page element lives in a page class under "pages/"
- Tests live under "tests/"
- Decorate every test with Allure decorators (@allure.feature, @allure.story, @allure.step)
- Add pytest.ini or conftest.py at the project root when needed to run
- Initialize and close Playwright through fixtures
- Do not use dependencies other than playwright, pytest and allure-pytest

Example shape:
{{"directory_structure": {{"pages/": {{"login_page.py": "..."}}, "tests/": {{"test_login.py": "..."}}, "pytest.ini": "..."}}}}"#
    )
}

pub fn ui_code_input(plan: &str, page_html: &str) -> String {
    format!("Test plan:\n{plan}\n\nHTML:\n{page_html}")
}

pub fn api_code_prompt(
    plan: &str,
    base_endpoint: &str,
    contract: &str,
    token: Option<&str>,
) -> String {
    let token = token.unwrap_or("not provided");
    format!(
        r#"{CODE_SYSTEM_PROMPT}

You are an expert in API test automation with Python 3.9+, pytest, requests, pydantic and allure-pytest.
Generate fully working automated tests from the test plan below.
- API clients live in their own classes under "tests/api/clients/" (a base client plus one client per resource)
- Pydantic models validating requests and responses live under "tests/api/schemas/"
- Test data (valid, invalid, boundary) lives under "tests/test_data/"
- conftest.py provides base_url (with a --base-url option), auth_headers and api_client fixtures
- Every test uses @allure.title, @allure.feature, @allure.story, @allure.tag and @allure.label("priority", ...)
- Every Arrange, Act and Assert step is wrapped in `with allure.step("...")`
- Test functions are named test_<case id in snake_case>, classes Test<Feature>
- Never hardcode URLs or tokens; send the token as "Authorization: Bearer <token>" through fixtures
- Never use @allure.manual or sleeps

Test plan:
{plan}

Base endpoint: {base_endpoint}
OpenAPI document:
{contract}
Token: {token}"#
    )
}
